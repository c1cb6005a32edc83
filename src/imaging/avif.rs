//! AVIF reading.
//!
//! The `image` crate's `"avif"` feature only enables the encoder (rav1e);
//! its decoder needs the C library dav1d. AVIF buffers are read here
//! instead: `avif-parse` unpacks the container and `rav1d` (the Rust port of
//! dav1d) decodes the AV1 payload, which is then converted from YUV to RGB.
//!
//! Only the color item is decoded. An alpha item, if present, is reported by
//! [`header`] but dropped from the decoded pixels.

use super::backend::BackendError;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use std::ptr::NonNull;

/// Container-level facts about an AVIF buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvifHeader {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// True if `data` starts with an ISOBMFF `ftyp` box branded for AVIF.
pub fn is_avif(data: &[u8]) -> bool {
    data.len() >= 12 && &data[4..8] == b"ftyp" && matches!(&data[8..12], b"avif" | b"avis")
}

fn parse(data: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| BackendError::Decode(format!("invalid AVIF container: {e:?}")))
}

/// Dimensions and alpha presence, without decoding any pixels.
pub fn header(data: &[u8]) -> Result<AvifHeader, BackendError> {
    let avif = parse(data)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("unreadable AVIF metadata: {e:?}")))?;
    Ok(AvifHeader {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
        has_alpha: avif.alpha_item.is_some(),
    })
}

/// Decode the color item of an AVIF buffer to RGB8.
pub fn decode(data: &[u8]) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;

    let avif = parse(data)?;
    let av1: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let mut input = Dav1dData::default();
    let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut input), av1.len()) };
    if buf.is_null() {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(BackendError::Decode("rav1d could not allocate input".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut input)) };
    if rc.0 != 0 {
        unsafe {
            dav1d::dav1d_data_unref(NonNull::new(&mut input));
            dav1d::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(BackendError::Decode(format!("rav1d rejected data ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(BackendError::Decode(format!("rav1d produced no picture ({})", rc.0)));
    }

    let converted = picture_to_rgb(&pic);
    unsafe {
        dav1d::dav1d_picture_unref(NonNull::new(&mut pic));
        dav1d::dav1d_close(NonNull::new(&mut ctx));
    }
    converted
}

/// Convert a decoded picture to an RGB8 image. The picture stays owned by
/// the caller.
fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let plane = |i: usize| -> Result<*const u8, BackendError> {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::Decode(format!("AVIF picture is missing plane {i}")))
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let y_ptr = plane(0)?;
    let layout = pic.p.layout;

    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }
    } else {
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                return Err(BackendError::Decode(format!(
                    "unsupported AVIF pixel layout: {layout}"
                )));
            }
        };
        YuvPlanes {
            y_ptr,
            u_ptr: plane(1)?,
            v_ptr: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width,
            height,
            bpc: pic.p.bpc as u32,
            ss_x,
            ss_y,
            monochrome: false,
        }
    };

    RgbImage::from_raw(width, height, planes.to_rgb())
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("decoded AVIF has inconsistent size".into()))
}

/// Borrowed YUV planes of a decoded picture.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling, horizontal and vertical (I420 = both).
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 full-range coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in 0..self.height {
            for col in 0..self.width {
                let y = self.sample(self.y_ptr, self.y_stride, col, row);
                let (r, g, b) = if self.monochrome {
                    (y, y, y)
                } else {
                    let cx = if self.ss_x { col / 2 } else { col };
                    let cy = if self.ss_y { row / 2 } else { row };
                    let cb = self.sample(self.u_ptr, self.uv_stride, cx, cy) - center;
                    let cr = self.sample(self.v_ptr, self.uv_stride, cx, cy) - center;
                    (
                        y + 1.402 * cr,
                        y - 0.344136 * cb - 0.714136 * cr,
                        y + 1.772 * cb,
                    )
                };
                for c in [r, g, b] {
                    rgb.push((c * scale).round().clamp(0.0, 255.0) as u8);
                }
            }
        }
        rgb
    }

    /// One sample; above 8 bits per channel samples are stored as u16.
    #[inline]
    fn sample(&self, ptr: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        let row = y as isize * stride;
        if self.bpc <= 8 {
            (unsafe { *ptr.offset(row + x as isize) }) as f32
        } else {
            (unsafe { (ptr.offset(row + x as isize * 2) as *const u16).read_unaligned() }) as f32
        }
    }
}
