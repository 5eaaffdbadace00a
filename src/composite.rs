use image::{GrayImage, Rgba, RgbaImage};

use crate::{StyleMaskError, StyleMaskResult};

/// Inputs for one blend of a stylized image into the content under a mask.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub content: &'a RgbaImage,
    pub stylized: &'a RgbaImage,
    /// `None` disables masking: the whole image is cross-faded by `strength`.
    pub mask: Option<&'a GrayImage>,
    pub strength: f32,
}

impl<'a> CompositeRequest<'a> {
    pub fn new(content: &'a RgbaImage, stylized: &'a RgbaImage, strength: f32) -> Self {
        Self {
            content,
            stylized,
            mask: None,
            strength,
        }
    }

    pub fn with_mask(mut self, mask: &'a GrayImage) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Clamp a blend strength into [0, 1]; NaN becomes 0.
pub fn clamp_strength(strength: f32) -> f32 {
    if strength.is_nan() {
        0.0
    } else {
        strength.clamp(0.0, 1.0)
    }
}

/// Blend the stylized image into the content where the mask allows.
///
/// Per pixel, `effective = mask / 255 * strength` and each color channel becomes
/// `content * (1 - effective) + stylized * effective`, rounded. Alpha is always the
/// content's. All buffers must already share the content's size.
pub fn composite(request: &CompositeRequest<'_>) -> StyleMaskResult<RgbaImage> {
    let CompositeRequest {
        content,
        stylized,
        mask,
        strength,
    } = *request;

    let expected = content.dimensions();
    if stylized.dimensions() != expected {
        return Err(StyleMaskError::DimensionMismatch {
            expected,
            found: stylized.dimensions(),
        });
    }
    if let Some(mask) = mask
        && mask.dimensions() != expected
    {
        return Err(StyleMaskError::DimensionMismatch {
            expected,
            found: mask.dimensions(),
        });
    }

    let strength = clamp_strength(strength);
    let (w, h) = expected;
    let mut out = RgbaImage::new(w, h);

    match mask {
        Some(mask) => {
            for (((c_px, s_px), m_px), out_px) in content
                .pixels()
                .zip(stylized.pixels())
                .zip(mask.pixels())
                .zip(out.pixels_mut())
            {
                let effective = f32::from(m_px[0]) / 255.0 * strength;
                *out_px = blend_pixel(c_px, s_px, effective);
            }
        }
        None => {
            for ((c_px, s_px), out_px) in content
                .pixels()
                .zip(stylized.pixels())
                .zip(out.pixels_mut())
            {
                *out_px = blend_pixel(c_px, s_px, strength);
            }
        }
    }

    Ok(out)
}

fn blend_pixel(content: &Rgba<u8>, stylized: &Rgba<u8>, effective: f32) -> Rgba<u8> {
    let [r, g, b] = mix_rgb(content, stylized, 1.0 - effective, effective);
    Rgba([r, g, b, content[3]])
}

/// Weighted sum of the color channels of two pixels, rounded and clamped.
fn mix_rgb(bottom: &Rgba<u8>, top: &Rgba<u8>, bottom_weight: f32, top_weight: f32) -> [u8; 3] {
    std::array::from_fn(|c| {
        let mixed = f32::from(bottom[c]) * bottom_weight + f32::from(top[c]) * top_weight;
        mixed.round().clamp(0.0, 255.0) as u8
    })
}

/// Tint the included part of the mask over the content, for showing the mask while editing.
///
/// `tint[3]` is the overlay opacity at full mask intensity.
pub fn mask_preview(content: &RgbaImage, mask: &GrayImage, tint: [u8; 4]) -> StyleMaskResult<RgbaImage> {
    let expected = content.dimensions();
    if mask.dimensions() != expected {
        return Err(StyleMaskError::DimensionMismatch {
            expected,
            found: mask.dimensions(),
        });
    }

    let [r, g, b, base_alpha] = tint;
    let mut out = RgbaImage::new(expected.0, expected.1);
    for ((bg_px, m_px), out_px) in content.pixels().zip(mask.pixels()).zip(out.pixels_mut()) {
        let fg_alpha = (u16::from(m_px[0]) * u16::from(base_alpha)) / 255;
        *out_px = source_over(bg_px, &Rgba([r, g, b, fg_alpha as u8]));
    }
    Ok(out)
}

/// Porter-Duff source-over of one pixel.
fn source_over(bottom: &Rgba<u8>, top: &Rgba<u8>) -> Rgba<u8> {
    let fg_a = f32::from(top[3]) / 255.0;
    let bg_a = f32::from(bottom[3]) / 255.0;
    let out_a = fg_a + bg_a * (1.0 - fg_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let [r, g, b] = mix_rgb(bottom, top, bg_a * (1.0 - fg_a) / out_a, fg_a / out_a);
    Rgba([r, g, b, (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn rgba_image(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn gray_image(w: u32, h: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([value]))
    }

    mod composite {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn half_strength_full_mask_averages() {
                let content = rgba_image(1, 1, [200, 100, 50, 255]);
                let stylized = rgba_image(1, 1, [10, 10, 10, 255]);
                let mask = gray_image(1, 1, 255);

                let out = composite(&CompositeRequest::new(&content, &stylized, 0.5).with_mask(&mask)).unwrap();
                let px = out.get_pixel(0, 0).0;
                for (got, exact) in px[..3].iter().zip([105.0f32, 55.0, 30.0]) {
                    assert!((f32::from(*got) - exact).abs() <= 1.0, "{got} vs {exact}");
                }
                assert_eq!(px[3], 255);
            }

            #[test]
            fn zero_mask_passes_content_through() {
                let content = rgba_image(3, 2, [1, 2, 3, 4]);
                let stylized = rgba_image(3, 2, [200, 200, 200, 255]);
                let mask = gray_image(3, 2, 0);
                let out = composite(&CompositeRequest::new(&content, &stylized, 1.0).with_mask(&mask)).unwrap();
                assert_eq!(out, content);
            }

            #[test]
            fn no_mask_is_uniform_cross_fade() {
                let content = rgba_image(2, 2, [0, 0, 0, 255]);
                let stylized = rgba_image(2, 2, [200, 100, 50, 255]);
                let out = composite(&CompositeRequest::new(&content, &stylized, 0.25)).unwrap();
                for px in out.pixels() {
                    assert_eq!(px.0, [50, 25, 13, 255]);
                }
            }

            #[test]
            fn content_alpha_preserved() {
                let content = rgba_image(1, 1, [10, 10, 10, 17]);
                let stylized = rgba_image(1, 1, [90, 90, 90, 255]);
                let mask = gray_image(1, 1, 255);
                let out = composite(&CompositeRequest::new(&content, &stylized, 1.0).with_mask(&mask)).unwrap();
                assert_eq!(out.get_pixel(0, 0).0, [90, 90, 90, 17]);
            }

            #[test]
            fn strength_clamped() {
                let content = rgba_image(1, 1, [0, 0, 0, 255]);
                let stylized = rgba_image(1, 1, [100, 100, 100, 255]);
                let over = composite(&CompositeRequest::new(&content, &stylized, 3.0)).unwrap();
                assert_eq!(over.get_pixel(0, 0).0, [100, 100, 100, 255]);
                let under = composite(&CompositeRequest::new(&content, &stylized, -1.0)).unwrap();
                assert_eq!(under.get_pixel(0, 0).0, [0, 0, 0, 255]);
                let nan = composite(&CompositeRequest::new(&content, &stylized, f32::NAN)).unwrap();
                assert_eq!(nan.get_pixel(0, 0).0, [0, 0, 0, 255]);
            }

            #[test]
            fn partial_mask_scales_strength() {
                let content = rgba_image(1, 1, [0, 0, 0, 255]);
                let stylized = rgba_image(1, 1, [255, 255, 255, 255]);
                let mask = gray_image(1, 1, 51); // 0.2
                let out = composite(&CompositeRequest::new(&content, &stylized, 0.5).with_mask(&mask)).unwrap();
                // 255 * 0.2 * 0.5 = 25.5
                let value = out.get_pixel(0, 0).0[0];
                assert!(value == 25 || value == 26);
            }

            #[test]
            fn stylized_mismatch_rejected() {
                let content = rgba_image(4, 4, [0, 0, 0, 255]);
                let stylized = rgba_image(2, 2, [0, 0, 0, 255]);
                let err = composite(&CompositeRequest::new(&content, &stylized, 1.0)).unwrap_err();
                match err {
                    StyleMaskError::DimensionMismatch { expected, found } => {
                        assert_eq!(expected, (4, 4));
                        assert_eq!(found, (2, 2));
                    }
                    other => panic!("unexpected error: {other:?}"),
                }
            }

            #[test]
            fn mask_mismatch_rejected() {
                let content = rgba_image(4, 4, [0, 0, 0, 255]);
                let stylized = rgba_image(4, 4, [0, 0, 0, 255]);
                let mask = gray_image(4, 3, 255);
                let err = composite(&CompositeRequest::new(&content, &stylized, 1.0).with_mask(&mask)).unwrap_err();
                assert!(matches!(
                    err,
                    StyleMaskError::DimensionMismatch { found: (4, 3), .. }
                ));
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            fn arb_image(w: u32, h: u32) -> impl Strategy<Value = RgbaImage> {
                proptest::collection::vec(proptest::num::u8::ANY, (w * h * 4) as usize)
                    .prop_map(move |data| RgbaImage::from_raw(w, h, data).unwrap())
            }

            fn arb_pair() -> impl Strategy<Value = (RgbaImage, RgbaImage, GrayImage)> {
                (1u32..8, 1u32..8).prop_flat_map(|(w, h)| {
                    (
                        arb_image(w, h),
                        arb_image(w, h),
                        proptest::collection::vec(proptest::num::u8::ANY, (w * h) as usize)
                            .prop_map(move |data| GrayImage::from_raw(w, h, data).unwrap()),
                    )
                })
            }

            proptest! {
                /// composite: zero strength returns the content exactly
                #[test]
                fn zero_strength_is_content((content, stylized, mask) in arb_pair()) {
                    let out = composite(&CompositeRequest::new(&content, &stylized, 0.0).with_mask(&mask)).unwrap();
                    prop_assert_eq!(out, content);
                }

                /// composite: full strength under a full mask returns the stylized colors
                #[test]
                fn full_strength_full_mask_is_stylized((content, stylized, _mask) in arb_pair()) {
                    let (w, h) = content.dimensions();
                    let full = GrayImage::from_pixel(w, h, Luma([255]));
                    let out = composite(&CompositeRequest::new(&content, &stylized, 1.0).with_mask(&full)).unwrap();
                    for ((o, s), c) in out.pixels().zip(stylized.pixels()).zip(content.pixels()) {
                        prop_assert_eq!(&o.0[..3], &s.0[..3]);
                        prop_assert_eq!(o.0[3], c.0[3]);
                    }
                }

                /// composite: every channel stays between the two inputs
                #[test]
                fn output_between_inputs(
                    (content, stylized, mask) in arb_pair(),
                    strength in 0.0f32..=1.0
                ) {
                    let out = composite(&CompositeRequest::new(&content, &stylized, strength).with_mask(&mask)).unwrap();
                    for ((o, c), s) in out.pixels().zip(content.pixels()).zip(stylized.pixels()) {
                        for ch in 0..3 {
                            let lo = c.0[ch].min(s.0[ch]);
                            let hi = c.0[ch].max(s.0[ch]);
                            prop_assert!(o.0[ch] >= lo && o.0[ch] <= hi);
                        }
                    }
                }
            }
        }
    }

    mod mask_preview {
        use super::*;

        #[test]
        fn tints_only_masked_pixels() {
            let content = rgba_image(2, 1, [0, 0, 0, 255]);
            let mut mask = GrayImage::new(2, 1);
            mask.put_pixel(1, 0, Luma([255]));

            let out = mask_preview(&content, &mask, [255, 0, 0, 255]).unwrap();
            assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
            assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
        }

        #[test]
        fn half_opacity_tint_blends() {
            let content = rgba_image(1, 1, [0, 0, 0, 255]);
            let mask = gray_image(1, 1, 255);
            let out = mask_preview(&content, &mask, [255, 255, 255, 128]).unwrap();
            let px = out.get_pixel(0, 0).0;
            assert_eq!(px[3], 255);
            assert!((i32::from(px[0]) - 128).abs() <= 1);
        }

        #[test]
        fn transparent_content_takes_tint_color() {
            let content = rgba_image(2, 1, [40, 50, 60, 0]);
            let mut mask = GrayImage::new(2, 1);
            mask.put_pixel(0, 0, Luma([255]));

            let out = mask_preview(&content, &mask, [0, 200, 0, 100]).unwrap();
            assert_eq!(out.get_pixel(0, 0).0, [0, 200, 0, 100]);
            assert_eq!(out.get_pixel(1, 0).0, [0, 0, 0, 0]);
        }

        #[test]
        fn mismatch_rejected() {
            let content = rgba_image(2, 2, [0, 0, 0, 255]);
            let mask = gray_image(3, 3, 255);
            assert!(mask_preview(&content, &mask, [255, 0, 0, 128]).is_err());
        }
    }
}
