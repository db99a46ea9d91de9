use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Consecutive packets the decoder may reject before the stream is treated
/// as failed.
const MAX_DECODE_FAILURES: usize = 64;

/// Decodes frames via ffmpeg-next (libavformat + libavcodec).
///
/// Accepts anything libavformat can open: local files as well as RTSP and
/// HTTP stream URLs. Each decoded frame is converted to RGB24.
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    video_stream_index: usize,
    metadata: Option<StreamMetadata>,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            decoder: None,
            scaler: None,
            video_stream_index: 0,
            metadata: None,
        }
    }

    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Network I/O timeout in microseconds. A stalled stream surfaces as a read
/// error instead of blocking forever.
const NETWORK_TIMEOUT_US: &str = "10000000";

/// Demuxer options for a source: TCP transport and a socket timeout for
/// RTSP, an I/O timeout for other network URLs, none for local files.
fn input_options(source: &str) -> Vec<(&'static str, &'static str)> {
    if source.starts_with("rtsp://") || source.starts_with("rtsps://") {
        vec![("rtsp_transport", "tcp"), ("timeout", NETWORK_TIMEOUT_US)]
    } else if source.contains("://") && !source.starts_with("file://") {
        vec![("rw_timeout", NETWORK_TIMEOUT_US)]
    } else {
        Vec::new()
    }
}

fn open_input(source: &str) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
    let options = input_options(source);
    if options.is_empty() {
        return ffmpeg_next::format::input(&source);
    }
    let mut dict = ffmpeg_next::Dictionary::new();
    for (key, value) in options {
        dict.set(key, value);
    }
    ffmpeg_next::format::input_with_dictionary(&source, dict)
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, source: &str) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = open_input(source)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let metadata = StreamMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source: source.to_string(),
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Opened {source}: {}x{} @ {fps:.2} fps ({})",
            metadata.width,
            metadata.height,
            if metadata.is_live() { "live".to_string() } else { format!("{} frames", metadata.total_frames) }
        );

        self.video_stream_index = video_stream_index;
        self.metadata = Some(metadata.clone());
        self.decoder = Some(decoder);
        self.scaler = Some(scaler);
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let (Some(ictx), Some(decoder), Some(scaler)) = (
            self.input_ctx.as_mut(),
            self.decoder.as_mut(),
            self.scaler.as_mut(),
        ) else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        let width = decoder.width();
        let height = decoder.height();

        Box::new(FfmpegFrameIter {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index: self.video_stream_index,
            frame_index: 0,
            decode_failures: 0,
            flushing: false,
            done: false,
        })
    }

    fn close(&mut self) {
        self.scaler = None;
        self.decoder = None;
        self.input_ctx = None;
        self.metadata = None;
    }
}

/// Lazy iterator that decodes one frame at a time so live streams never
/// need buffering.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: &'a mut ffmpeg_next::decoder::Video,
    scaler: &'a mut ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    decode_failures: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            self.done = true;
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(self.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    if let Some(result) = self.try_receive() {
                        return Some(result);
                    }
                    self.done = true;
                    return None;
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    continue;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(format!(
                        "failed to read packet after frame {}: {e}",
                        self.frame_index
                    )
                    .into()));
                }
            }

            if packet.stream() != self.video_stream_index {
                continue;
            }

            if let Err(e) = self.decoder.send_packet(&packet) {
                self.decode_failures += 1;
                log::debug!("Decoder rejected packet after frame {}: {e}", self.frame_index);
                if self.decode_failures >= MAX_DECODE_FAILURES {
                    self.done = true;
                    return Some(Err(format!(
                        "decoder failed on {MAX_DECODE_FAILURES} consecutive packets: {e}"
                    )
                    .into()));
                }
                continue;
            }
            self.decode_failures = 0;

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// stripping any row padding (stride > width * 3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
