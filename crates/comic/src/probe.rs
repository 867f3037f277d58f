/// Image decoder seam used to fill in page dimensions.
///
/// Decoding is left to the caller so this crate stays free of image codecs.
pub trait ImageProbe: Send + Sync {
    /// Width and height of an encoded image, or `None` if it can't be decoded.
    fn dimensions(&self, data: &[u8]) -> Option<(u32, u32)>;
}

/// Probe that never decodes anything; only byte sizes get recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl ImageProbe for NoProbe {
    fn dimensions(&self, _data: &[u8]) -> Option<(u32, u32)> {
        None
    }
}

impl<F> ImageProbe for F
where
    F: Fn(&[u8]) -> Option<(u32, u32)> + Send + Sync,
{
    fn dimensions(&self, data: &[u8]) -> Option<(u32, u32)> {
        self(data)
    }
}
