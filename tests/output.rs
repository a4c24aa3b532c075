mod tests {
    use dimmer_composer::{RgbStrip, RgbwStrip, StripError, StripOutput};
    use smart_leds::{RGB8, RGBW, SmartLedsWrite, White};

    #[derive(Default)]
    struct Recorder<C> {
        frames: Vec<Vec<C>>,
        fail: bool,
    }

    impl<C> SmartLedsWrite for Recorder<C> {
        type Error = ();
        type Color = C;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            if self.fail {
                return Err(());
            }
            self.frames.push(iterator.into_iter().map(Into::into).collect());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Pin {
        high: Vec<bool>,
    }

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = core::convert::Infallible;
    }

    impl embedded_hal::digital::OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high.push(true);
            Ok(())
        }
    }

    #[test]
    fn test_rgb_strip_writes_pixels() {
        let mut strip = RgbStrip::new(Recorder::<RGB8>::default());
        strip.refresh(&[1, 2, 3, 4, 5, 6], 3).unwrap();
        let (writer, _) = strip.release();
        assert_eq!(writer.frames, vec![vec![RGB8::new(1, 2, 3), RGB8::new(4, 5, 6)]]);
    }

    #[test]
    fn test_rgbw_strip_carries_white() {
        let mut strip = RgbwStrip::new(Recorder::<RGBW<u8>>::default());
        strip.refresh(&[1, 2, 3, 4], 4).unwrap();
        let (writer, _) = strip.release();
        let pixel = writer.frames[0][0];
        assert_eq!((pixel.r, pixel.g, pixel.b), (1, 2, 3));
        assert_eq!(pixel.a, White(4));
    }

    #[test]
    fn test_wrong_bpp_and_driver_errors() {
        let mut rgb = RgbStrip::new(Recorder::<RGB8>::default());
        assert_eq!(rgb.refresh(&[0; 8], 4), Err(StripError::UnsupportedBpp(4)));

        let mut rgbw = RgbwStrip::new(Recorder::<RGBW<u8>> {
            frames: Vec::new(),
            fail: true,
        });
        assert_eq!(rgbw.refresh(&[0; 8], 4), Err(StripError::WriteFailed));
    }

    #[test]
    fn test_power_rail_follows_requests() {
        let mut strip = RgbStrip::with_power(Recorder::<RGB8>::default(), Pin::default());
        strip.set_power(true);
        strip.set_power(false);
        let (_, pin) = strip.release();
        assert_eq!(pin.high, vec![true, false]);
    }
}
