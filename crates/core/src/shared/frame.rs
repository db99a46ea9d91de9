use ndarray::ArrayView3;

/// One decoded frame: tightly packed RGB bytes in row-major order, tagged
/// with its position in the source stream.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * CHANNELS,
            "frame data must be width * height * 3 bytes"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Black frame of the given size.
    pub fn blank(width: u32, height: u32, index: usize) -> Self {
        Self::new(
            vec![0; width as usize * height as usize * CHANNELS],
            width,
            height,
            index,
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `[height, width, channel]` view over the pixel buffer.
    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("frame buffer must be width * height * 3 bytes")
    }
}
