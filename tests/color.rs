mod tests {
    use dimmer_composer::color::{Colorspace, Rgbf, Rgbwf, channel_to_u8, kelvin_to_rgb, luminance};

    #[test]
    fn test_kelvin_to_rgb_is_normalized() {
        for kelvin in [1500.0, 2700.0, 4000.0, 6500.0, 10_000.0] {
            let color = kelvin_to_rgb(kelvin);
            assert!((color.max_channel() - 1.0).abs() < 1e-6, "{kelvin}");
            assert!(color.r >= 0.0 && color.g >= 0.0 && color.b >= 0.0);
        }
        let warm = kelvin_to_rgb(2200.0);
        let cool = kelvin_to_rgb(6500.0);
        assert!(warm.b < cool.b);
    }

    #[test]
    fn test_channel_to_u8() {
        assert_eq!(channel_to_u8(0.0, 1.0), 0);
        assert_eq!(channel_to_u8(1.0, 1.0), 255);
        assert_eq!(channel_to_u8(2.0, 1.0), 255);
        assert_eq!(channel_to_u8(-1.0, 1.0), 0);
        assert!(channel_to_u8(0.5, 2.2) < channel_to_u8(0.5, 1.0));
    }

    #[test]
    fn test_rgbw_lerp_and_bytes() {
        let mid = Rgbwf::OFF.lerp(&Rgbwf::FULL, 0.5);
        assert_eq!(mid, Rgbwf::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(Rgbwf::FULL.to_bytes(1.0), [255, 255, 255, 255]);
        assert_eq!(Rgbwf::FULL.without_white().w, 0.0);
    }

    #[test]
    fn test_to_rgbw_hits_requested_brightness() {
        let colorspace = Colorspace::new(4000.0, 1.0);
        for temperature in [2200.0, 3000.0, 4000.0, 5000.0, 6500.0] {
            let max = colorspace.max_correct_level(temperature);
            assert!(max > 0.0 && max <= 1.0 + 1e-6);
            for step in 1..=4 {
                let level = max * step as f32 / 4.0;
                let color = colorspace.to_rgbw(temperature, level);
                assert!(
                    (colorspace.brightness(&color) - level).abs() < 1e-3,
                    "{temperature} K at {level}"
                );
            }
        }
    }

    #[test]
    fn test_to_rgbw_keeps_hue_below_max_correct() {
        let colorspace = Colorspace::new(4000.0, 1.0);
        let temperature = 2700.0;
        let level = colorspace.max_correct_level(temperature) * 0.5;
        let drive = colorspace.to_rgbw(temperature, level);

        // Light emitted = rgb drive + w * white LED color
        let white = kelvin_to_rgb(4000.0);
        let emitted = Rgbf::new(
            drive.r + drive.w * white.r,
            drive.g + drive.w * white.g,
            drive.b + drive.w * white.b,
        )
        .normalized();
        let target = kelvin_to_rgb(temperature);
        assert!((emitted.r - target.r).abs() < 1e-3);
        assert!((emitted.g - target.g).abs() < 1e-3);
        assert!((emitted.b - target.b).abs() < 1e-3);
    }

    #[test]
    fn test_to_rgbw_above_max_correct_reaches_full() {
        let colorspace = Colorspace::new(4000.0, 1.0);
        let full = colorspace.to_rgbw(2700.0, 1.0);
        assert!(full.r > 0.999 && full.g > 0.999 && full.b > 0.999 && full.w > 0.999);
        assert_eq!(colorspace.to_rgbw(2700.0, 0.0), Rgbwf::OFF);

        let max = colorspace.max_correct_level(2700.0);
        let low = colorspace.brightness(&colorspace.to_rgbw(2700.0, max + 0.01));
        let high = colorspace.brightness(&colorspace.to_rgbw(2700.0, 0.99));
        assert!(low < high);
    }

    #[test]
    fn test_rgb_only_matches_rgbw_brightness() {
        let colorspace = Colorspace::new(4000.0, 1.0);
        let rgb = colorspace.to_rgb_only(3000.0, 0.2);
        assert_eq!(rgb.w, 0.0);
        assert!((colorspace.brightness(&rgb) - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_luminance_weights() {
        assert!((luminance(&Rgbf::new(1.0, 1.0, 1.0)) - 1.0).abs() < 1e-6);
        assert!(luminance(&Rgbf::new(0.0, 1.0, 0.0)) > luminance(&Rgbf::new(1.0, 0.0, 0.0)));
    }
}
