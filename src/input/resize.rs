//! 工作分辨率缩放

use anyhow::{Context, Result};
use fast_image_resize as fr;
use image::RgbImage;

/// 缩放到 `width x height` (双线性), 尺寸相同时直接拷贝
pub fn resize_frame(frame: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_w, src_h) = frame.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(frame.clone());
    }

    let src_image =
        fr::images::Image::from_vec_u8(src_w, src_h, frame.as_raw().clone(), fr::PixelType::U8x3)
            .context("创建缩放源图像失败")?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .context("缩放失败")?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec()).context("缩放结果尺寸不匹配")
}
