mod tests {
    use dimmer_composer::color::Colorspace;
    use dimmer_composer::curve::{
        CalibrationMode, ColorCurveEngine, Distribution, FocalProfile, MIN_CUMULATIVE, distribute,
        plan, sigma_for_spread,
    };

    const MAX_CORRECT: f32 = 0.8;

    fn mean(values: &[f32]) -> f32 {
        values.iter().sum::<f32>() / values.len() as f32
    }

    #[test]
    fn test_focused_light_peaks_at_focal_point() {
        let mut levels = [0.0; 10];
        let distribution = distribute(0.05, MAX_CORRECT, 0.5, 0.3, &mut levels);
        assert!(matches!(distribution, Distribution::Focused { .. }));

        let peak = levels[4].max(levels[5]);
        assert!(peak > levels[0]);
        assert!(peak > levels[9]);
        assert!((mean(&levels) - 0.05).abs() < 1e-4);
        assert!(levels.iter().all(|l| *l <= MAX_CORRECT + 1e-6));
    }

    #[test]
    fn test_spread_widens_until_level_fits() {
        // A narrow profile cannot deliver 0.7 without exceeding the
        // color-correct level, so it must be widened.
        let (distribution, _) = plan(0.7, MAX_CORRECT, 0.5, 0.1);
        let Distribution::Focused {
            spread, cumulative, ..
        } = distribution
        else {
            panic!("expected a focused distribution");
        };
        assert!(spread > 0.1);
        assert!(cumulative * MAX_CORRECT >= 0.7 - 1e-6);

        let mut levels = [0.0; 30];
        distribute(0.7, MAX_CORRECT, 0.5, 0.1, &mut levels);
        assert!((mean(&levels) - 0.7).abs() < 1e-3);
        assert!(levels.iter().all(|l| *l <= MAX_CORRECT + 1e-4));
    }

    #[test]
    fn test_uniform_cases() {
        let mut levels = [0.0; 8];
        assert_eq!(distribute(0.0, MAX_CORRECT, 0.5, 0.3, &mut levels), Distribution::Uniform);
        assert!(levels.iter().all(|l| *l == 0.0));

        assert_eq!(distribute(0.9, MAX_CORRECT, 0.5, 0.3, &mut levels), Distribution::Uniform);
        assert!(levels.iter().all(|l| *l == 0.9));

        assert_eq!(distribute(0.4, MAX_CORRECT, 0.5, 0.95, &mut levels), Distribution::Uniform);
        assert!(levels.iter().all(|l| *l == 0.4));
    }

    #[test]
    fn test_degenerate_focal_point_stays_finite() {
        let mut levels = [0.0; 16];
        distribute(0.3, MAX_CORRECT, 0.0, 0.0, &mut levels);
        assert!(levels.iter().all(|l| l.is_finite() && *l >= 0.0 && *l <= 1.0));
        assert!(levels[0] > levels[15]);

        let profile = FocalProfile::new(1.0, 0.0);
        assert!(profile.cumulative().max(MIN_CUMULATIVE) > 0.0);
    }

    #[test]
    fn test_sigma_for_spread() {
        assert_eq!(sigma_for_spread(0.99), None);
        assert_eq!(sigma_for_spread(1.0), None);
        let narrow = sigma_for_spread(0.1).unwrap();
        let wide = sigma_for_spread(0.8).unwrap();
        assert!(narrow < wide);
        assert!(sigma_for_spread(0.0).unwrap() > 0.0);
    }

    #[test]
    fn test_flat_profile_integral() {
        let profile = FocalProfile::new(0.5, 1.0);
        assert_eq!(profile.is_flat(), true);
        assert_eq!(profile.value(0.1), 1.0);
        assert!((profile.cumulative() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_engine_renders_uniform_strip() {
        let engine = ColorCurveEngine::new(Colorspace::default(), 3000.0);
        let mut levels = [0.0; 4];
        let mut pixels = [0u8; 16];

        assert_eq!(engine.render(0.5, 1.0, 4, &mut levels, &mut pixels), true);
        let first = [pixels[0], pixels[1], pixels[2], pixels[3]];
        assert!(first.iter().any(|b| *b != 0));
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(chunk, first);
        }

        // Same input, same bytes
        assert_eq!(engine.render(0.5, 1.0, 4, &mut levels, &mut pixels), false);

        engine.render(0.0, 1.0, 4, &mut levels, &mut pixels);
        assert!(pixels.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_engine_ignores_unsupported_bpp() {
        let engine = ColorCurveEngine::new(Colorspace::default(), 3000.0);
        let mut levels = [0.0; 4];
        let mut pixels = [0u8; 16];

        assert_eq!(engine.render(1.0, 1.0, 0, &mut levels, &mut pixels), false);
        assert_eq!(engine.render(1.0, 1.0, 5, &mut levels, &mut pixels), false);
        assert!(pixels.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_engine_calibration_modes() {
        let mut engine = ColorCurveEngine::new(Colorspace::default(), 4000.0);

        engine.params_mut().calibration = CalibrationMode::Rgb;
        assert_eq!(engine.pixel(0, 0.3).w, 0.0);

        engine.params_mut().calibration = CalibrationMode::Alternating;
        assert_eq!(engine.pixel(1, 0.3).w, 0.0);
        assert!(engine.pixel(0, 0.3).w > 0.0);

        engine.params_mut().calibration = CalibrationMode::Hard;
        engine
            .params_mut()
            .set_calibration_data(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
        assert_eq!(engine.pixel(0, 0.0).r, 0.1);
        assert_eq!(engine.pixel(1, 0.0).w, 0.8);

        engine.params_mut().set_calibration_data(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(engine.pixel(1, 0.0).r, 1.0);
    }

    #[test]
    fn test_calibration_mode_codes() {
        for mode in [
            CalibrationMode::Normal,
            CalibrationMode::Rgb,
            CalibrationMode::Alternating,
            CalibrationMode::Hard,
        ] {
            assert_eq!(CalibrationMode::from_i32(mode.as_i32()), mode);
        }
        assert_eq!(CalibrationMode::from_i32(42), CalibrationMode::Normal);
    }
}
