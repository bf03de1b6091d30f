//! FFmpeg-backed codec implementations.
//!
//! Video decode output is RGBA8, audio decode output is interleaved PCM f32.
//! All unsafe FFmpeg calls are isolated in this module; every context struct
//! owns its pointers exclusively and frees them in `Drop`. Packet and frame
//! timestamps cross the FFI boundary in a fixed microsecond timebase.

use std::ffi::c_void;
use std::ptr;

use ffmpeg_next::ffi;

use crate::core::chunk::EncodedChunk;
use crate::core::config::{AudioCodecConfig, VideoCodecConfig};
use crate::decode::backend::{
    AudioDecodeBackend, DecodeError, EncodeError, EncodeSettings, EncodedPacket,
    VideoDecodeBackend, VideoEncodeBackend,
};
use crate::decode::frame::{AudioBuffer, VideoFrame};

const MICROS_TIMEBASE: ffi::AVRational = ffi::AVRational {
    num: 1,
    den: 1_000_000,
};

fn video_codec_id(codec: &str) -> Option<ffi::AVCodecID> {
    let id = if codec.starts_with("avc1") || codec.starts_with("avc3") {
        ffi::AVCodecID::AV_CODEC_ID_H264
    } else if codec.starts_with("hvc1") || codec.starts_with("hev1") {
        ffi::AVCodecID::AV_CODEC_ID_HEVC
    } else if codec.starts_with("vp09") {
        ffi::AVCodecID::AV_CODEC_ID_VP9
    } else if codec.starts_with("av01") {
        ffi::AVCodecID::AV_CODEC_ID_AV1
    } else {
        return None;
    };
    Some(id)
}

fn audio_codec_id(codec: &str) -> Option<ffi::AVCodecID> {
    let id = if codec.starts_with("mp4a.40") {
        ffi::AVCodecID::AV_CODEC_ID_AAC
    } else if codec.eq_ignore_ascii_case("opus") {
        ffi::AVCodecID::AV_CODEC_ID_OPUS
    } else if codec.starts_with("mp4a.6b") || codec.eq_ignore_ascii_case("mp3") {
        ffi::AVCodecID::AV_CODEC_ID_MP3
    } else {
        return None;
    };
    Some(id)
}

/// Copy out-of-band config bytes into an av_malloc'd extradata buffer with
/// the padding FFmpeg requires.
unsafe fn set_extradata(ctx: *mut ffi::AVCodecContext, description: &[u8]) -> Result<(), String> {
    let padded = description.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
    let buf = ffi::av_mallocz(padded) as *mut u8;
    if buf.is_null() {
        return Err("av_mallocz failed for extradata".to_string());
    }
    ptr::copy_nonoverlapping(description.as_ptr(), buf, description.len());
    (*ctx).extradata = buf;
    (*ctx).extradata_size = description.len() as i32;
    Ok(())
}

unsafe fn open_decoder(id: ffi::AVCodecID) -> Result<*mut ffi::AVCodecContext, String> {
    let codec = ffi::avcodec_find_decoder(id);
    if codec.is_null() {
        return Err(format!("no decoder for {:?}", id));
    }
    let ctx = ffi::avcodec_alloc_context3(codec);
    if ctx.is_null() {
        return Err("avcodec_alloc_context3 failed".to_string());
    }
    Ok(ctx)
}

/// Build a transient packet pointing at `chunk`'s payload and send it.
/// FFmpeg copies non-refcounted packet data internally, so the borrow only
/// has to outlive the call.
unsafe fn send_chunk(ctx: *mut ffi::AVCodecContext, chunk: &EncodedChunk) -> Result<(), String> {
    let packet = ffi::av_packet_alloc();
    if packet.is_null() {
        return Err("av_packet_alloc failed".to_string());
    }
    (*packet).data = chunk.data.as_ptr() as *mut u8;
    (*packet).size = chunk.data.len() as i32;
    (*packet).pts = chunk.timestamp;
    (*packet).dts = chunk.timestamp;
    (*packet).duration = chunk.duration;
    if chunk.is_key() {
        (*packet).flags |= ffi::AV_PKT_FLAG_KEY as i32;
    }
    let ret = ffi::avcodec_send_packet(ctx, packet);
    let mut packet = packet;
    (*packet).data = ptr::null_mut();
    (*packet).size = 0;
    ffi::av_packet_free(&mut packet);
    if ret < 0 {
        return Err(format!("avcodec_send_packet returned {}", ret));
    }
    Ok(())
}

pub struct FfmpegVideoDecoder {
    ctx: Option<*mut ffi::AVCodecContext>,
    sws: *mut ffi::SwsContext,
    sws_dims: (i32, i32, i32),
    pending: Vec<VideoFrame>,
}

// The raw contexts are owned exclusively by this struct and only touched
// through &mut self.
unsafe impl Send for FfmpegVideoDecoder {}

impl FfmpegVideoDecoder {
    pub fn new() -> Self {
        Self {
            ctx: None,
            sws: ptr::null_mut(),
            sws_dims: (0, 0, 0),
            pending: Vec::new(),
        }
    }

    fn close(&mut self) {
        unsafe {
            if let Some(mut ctx) = self.ctx.take() {
                ffi::avcodec_free_context(&mut ctx);
            }
            if !self.sws.is_null() {
                ffi::sws_freeContext(self.sws);
                self.sws = ptr::null_mut();
            }
        }
    }

    /// Drain decoded frames out of the codec, converting each to RGBA8.
    unsafe fn receive_frames(&mut self, ctx: *mut ffi::AVCodecContext) -> Result<(), String> {
        let frame = ffi::av_frame_alloc();
        if frame.is_null() {
            return Err("av_frame_alloc failed".to_string());
        }
        loop {
            let ret = ffi::avcodec_receive_frame(ctx, frame);
            if ret < 0 {
                break;
            }

            let width = (*frame).width;
            let height = (*frame).height;
            let pix_fmt = (*frame).format;

            // (re)build the scaler when geometry or format changes
            if self.sws.is_null() || self.sws_dims != (width, height, pix_fmt) {
                if !self.sws.is_null() {
                    ffi::sws_freeContext(self.sws);
                }
                self.sws = ffi::sws_getContext(
                    width,
                    height,
                    std::mem::transmute::<i32, ffi::AVPixelFormat>(pix_fmt),
                    width,
                    height,
                    ffi::AVPixelFormat::AV_PIX_FMT_RGBA,
                    ffi::SWS_BILINEAR as i32,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                );
                self.sws_dims = (width, height, pix_fmt);
            }
            if self.sws.is_null() {
                ffi::av_frame_unref(frame);
                continue;
            }

            let mut data = vec![0u8; (width * height * 4) as usize];
            let dst_planes: [*mut u8; 4] = [data.as_mut_ptr(), ptr::null_mut(), ptr::null_mut(), ptr::null_mut()];
            let dst_strides: [i32; 4] = [width * 4, 0, 0, 0];
            ffi::sws_scale(
                self.sws,
                (*frame).data.as_ptr() as *const *const u8,
                (*frame).linesize.as_ptr(),
                0,
                height,
                dst_planes.as_ptr(),
                dst_strides.as_ptr(),
            );

            let timestamp = if (*frame).pts == ffi::AV_NOPTS_VALUE {
                (*frame).best_effort_timestamp
            } else {
                (*frame).pts
            };
            self.pending.push(VideoFrame {
                data,
                width: width as u32,
                height: height as u32,
                timestamp,
                duration: (*frame).duration,
            });
            ffi::av_frame_unref(frame);
        }
        let mut frame = frame;
        ffi::av_frame_free(&mut frame);
        Ok(())
    }
}

impl Default for FfmpegVideoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecodeBackend for FfmpegVideoDecoder {
    fn configure(&mut self, config: &VideoCodecConfig) -> Result<(), DecodeError> {
        self.close();
        let id = video_codec_id(&config.codec)
            .ok_or_else(|| DecodeError::UnsupportedCodec(config.codec.clone()))?;
        unsafe {
            let ctx = open_decoder(id).map_err(DecodeError::Configure)?;
            (*ctx).width = config.coded_width as i32;
            (*ctx).height = config.coded_height as i32;
            (*ctx).time_base = MICROS_TIMEBASE;
            if let Some(description) = &config.description {
                if let Err(e) = set_extradata(ctx, description) {
                    let mut ctx = ctx;
                    ffi::avcodec_free_context(&mut ctx);
                    return Err(DecodeError::Configure(e));
                }
            }
            let ret = ffi::avcodec_open2(ctx, ptr::null(), ptr::null_mut());
            if ret < 0 {
                let mut ctx = ctx;
                ffi::avcodec_free_context(&mut ctx);
                return Err(DecodeError::Configure(format!(
                    "avcodec_open2 returned {}",
                    ret
                )));
            }
            self.ctx = Some(ctx);
        }
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> Result<(), DecodeError> {
        let ctx = self.ctx.ok_or(DecodeError::NotConfigured)?;
        unsafe {
            send_chunk(ctx, chunk).map_err(DecodeError::Backend)?;
            self.receive_frames(ctx).map_err(DecodeError::Backend)?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<VideoFrame> {
        std::mem::take(&mut self.pending)
    }

    fn flush(&mut self) -> Result<Vec<VideoFrame>, DecodeError> {
        if let Some(ctx) = self.ctx {
            unsafe {
                // null packet enters drain mode
                ffi::avcodec_send_packet(ctx, ptr::null());
                self.receive_frames(ctx).map_err(DecodeError::Backend)?;
                ffi::avcodec_flush_buffers(ctx);
            }
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.close();
    }
}

impl Drop for FfmpegVideoDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct FfmpegAudioDecoder {
    ctx: Option<*mut ffi::AVCodecContext>,
    swr: *mut ffi::SwrContext,
    channels: u32,
    sample_rate: u32,
    pending: Vec<AudioBuffer>,
}

unsafe impl Send for FfmpegAudioDecoder {}

impl FfmpegAudioDecoder {
    pub fn new() -> Self {
        Self {
            ctx: None,
            swr: ptr::null_mut(),
            channels: 0,
            sample_rate: 0,
            pending: Vec::new(),
        }
    }

    fn close(&mut self) {
        unsafe {
            if let Some(mut ctx) = self.ctx.take() {
                ffi::avcodec_free_context(&mut ctx);
            }
            if !self.swr.is_null() {
                ffi::swr_free(&mut self.swr);
            }
        }
    }

    unsafe fn receive_buffers(&mut self, ctx: *mut ffi::AVCodecContext) -> Result<(), String> {
        let frame = ffi::av_frame_alloc();
        if frame.is_null() {
            return Err("av_frame_alloc failed".to_string());
        }
        loop {
            let ret = ffi::avcodec_receive_frame(ctx, frame);
            if ret < 0 {
                break;
            }

            let nb_samples = (*frame).nb_samples as usize;
            let mut samples = vec![0f32; nb_samples * self.channels as usize];
            let mut out_planes: [*mut u8; 8] = [ptr::null_mut(); 8];
            out_planes[0] = samples.as_mut_ptr() as *mut u8;

            let converted = ffi::swr_convert(
                self.swr,
                out_planes.as_mut_ptr(),
                nb_samples as i32,
                (*frame).data.as_ptr() as *const *const u8,
                nb_samples as i32,
            );
            if converted < 0 {
                ffi::av_frame_unref(frame);
                continue;
            }
            samples.truncate(converted as usize * self.channels as usize);

            self.pending.push(AudioBuffer {
                data: samples,
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp: (*frame).pts,
            });
            ffi::av_frame_unref(frame);
        }
        let mut frame = frame;
        ffi::av_frame_free(&mut frame);
        Ok(())
    }
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDecodeBackend for FfmpegAudioDecoder {
    fn configure(&mut self, config: &AudioCodecConfig) -> Result<(), DecodeError> {
        self.close();
        let id = audio_codec_id(&config.codec)
            .ok_or_else(|| DecodeError::UnsupportedCodec(config.codec.clone()))?;
        unsafe {
            let ctx = open_decoder(id).map_err(DecodeError::Configure)?;
            (*ctx).sample_rate = config.sample_rate as i32;
            (*ctx).time_base = MICROS_TIMEBASE;
            ffi::av_channel_layout_default(&mut (*ctx).ch_layout, config.channel_count as i32);
            if let Some(description) = &config.description {
                if let Err(e) = set_extradata(ctx, description) {
                    let mut ctx = ctx;
                    ffi::avcodec_free_context(&mut ctx);
                    return Err(DecodeError::Configure(e));
                }
            }
            let ret = ffi::avcodec_open2(ctx, ptr::null(), ptr::null_mut());
            if ret < 0 {
                let mut ctx = ctx;
                ffi::avcodec_free_context(&mut ctx);
                return Err(DecodeError::Configure(format!(
                    "avcodec_open2 returned {}",
                    ret
                )));
            }

            // converter to interleaved f32 at the source rate
            let swr = ffi::swr_alloc();
            if swr.is_null() {
                let mut ctx = ctx;
                ffi::avcodec_free_context(&mut ctx);
                return Err(DecodeError::Configure("swr_alloc failed".to_string()));
            }
            let obj = swr as *mut c_void;
            ffi::av_opt_set_chlayout(obj, c"in_chlayout".as_ptr(), &(*ctx).ch_layout, 0);
            ffi::av_opt_set_int(obj, c"in_sample_rate".as_ptr(), (*ctx).sample_rate as i64, 0);
            ffi::av_opt_set_sample_fmt(obj, c"in_sample_fmt".as_ptr(), (*ctx).sample_fmt, 0);
            ffi::av_opt_set_chlayout(obj, c"out_chlayout".as_ptr(), &(*ctx).ch_layout, 0);
            ffi::av_opt_set_int(obj, c"out_sample_rate".as_ptr(), (*ctx).sample_rate as i64, 0);
            ffi::av_opt_set_sample_fmt(
                obj,
                c"out_sample_fmt".as_ptr(),
                ffi::AVSampleFormat::AV_SAMPLE_FMT_FLT,
                0,
            );
            let ret = ffi::swr_init(swr);
            if ret < 0 {
                let mut swr = swr;
                ffi::swr_free(&mut swr);
                let mut ctx = ctx;
                ffi::avcodec_free_context(&mut ctx);
                return Err(DecodeError::Configure(format!("swr_init returned {}", ret)));
            }

            self.ctx = Some(ctx);
            self.swr = swr;
            self.channels = config.channel_count;
            self.sample_rate = config.sample_rate;
        }
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> Result<(), DecodeError> {
        let ctx = self.ctx.ok_or(DecodeError::NotConfigured)?;
        unsafe {
            send_chunk(ctx, chunk).map_err(DecodeError::Backend)?;
            self.receive_buffers(ctx).map_err(DecodeError::Backend)?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<AudioBuffer> {
        std::mem::take(&mut self.pending)
    }

    fn flush(&mut self) -> Result<Vec<AudioBuffer>, DecodeError> {
        if let Some(ctx) = self.ctx {
            unsafe {
                ffi::avcodec_send_packet(ctx, ptr::null());
                self.receive_buffers(ctx).map_err(DecodeError::Backend)?;
                ffi::avcodec_flush_buffers(ctx);
            }
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.close();
    }
}

impl Drop for FfmpegAudioDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct FfmpegVideoEncoder {
    ctx: Option<*mut ffi::AVCodecContext>,
    sws: *mut ffi::SwsContext,
    sws_src: (i32, i32),
    dims: (i32, i32),
    description: Option<Vec<u8>>,
    pending: Vec<EncodedPacket>,
}

unsafe impl Send for FfmpegVideoEncoder {}

impl FfmpegVideoEncoder {
    pub fn new() -> Self {
        Self {
            ctx: None,
            sws: ptr::null_mut(),
            sws_src: (0, 0),
            dims: (0, 0),
            description: None,
            pending: Vec::new(),
        }
    }

    fn close(&mut self) {
        unsafe {
            if let Some(mut ctx) = self.ctx.take() {
                ffi::avcodec_free_context(&mut ctx);
            }
            if !self.sws.is_null() {
                ffi::sws_freeContext(self.sws);
                self.sws = ptr::null_mut();
            }
        }
    }

    unsafe fn receive_packets(&mut self, ctx: *mut ffi::AVCodecContext) -> Result<(), String> {
        let packet = ffi::av_packet_alloc();
        if packet.is_null() {
            return Err("av_packet_alloc failed".to_string());
        }
        loop {
            let ret = ffi::avcodec_receive_packet(ctx, packet);
            if ret < 0 {
                break;
            }
            let data = std::slice::from_raw_parts((*packet).data, (*packet).size as usize).to_vec();
            self.pending.push(EncodedPacket {
                data,
                timestamp: (*packet).pts,
                duration: (*packet).duration,
                is_key: (*packet).flags & ffi::AV_PKT_FLAG_KEY as i32 != 0,
            });
            ffi::av_packet_unref(packet);
        }
        let mut packet = packet;
        ffi::av_packet_free(&mut packet);
        Ok(())
    }
}

impl Default for FfmpegVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncodeBackend for FfmpegVideoEncoder {
    fn configure(&mut self, settings: &EncodeSettings) -> Result<(), EncodeError> {
        self.close();
        if video_codec_id(&settings.codec) != Some(ffi::AVCodecID::AV_CODEC_ID_H264) {
            return Err(EncodeError::UnsupportedCodec(settings.codec.clone()));
        }
        unsafe {
            let codec = ffi::avcodec_find_encoder(ffi::AVCodecID::AV_CODEC_ID_H264);
            if codec.is_null() {
                return Err(EncodeError::Configure("no H.264 encoder built in".to_string()));
            }
            let ctx = ffi::avcodec_alloc_context3(codec);
            if ctx.is_null() {
                return Err(EncodeError::Configure("avcodec_alloc_context3 failed".to_string()));
            }
            (*ctx).width = settings.width as i32;
            (*ctx).height = settings.height as i32;
            (*ctx).pix_fmt = ffi::AVPixelFormat::AV_PIX_FMT_YUV420P;
            (*ctx).time_base = MICROS_TIMEBASE;
            (*ctx).bit_rate = settings.bitrate_bps as i64;
            (*ctx).gop_size = (settings.framerate * 4.0).round().max(1.0) as i32;
            // no B-frames: packet order must match presentation order
            (*ctx).max_b_frames = 0;
            (*ctx).flags |= ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;

            let ret = ffi::avcodec_open2(ctx, codec, ptr::null_mut());
            if ret < 0 {
                let mut ctx = ctx;
                ffi::avcodec_free_context(&mut ctx);
                return Err(EncodeError::Configure(format!(
                    "avcodec_open2 returned {}",
                    ret
                )));
            }

            if !(*ctx).extradata.is_null() && (*ctx).extradata_size > 0 {
                self.description = Some(
                    std::slice::from_raw_parts((*ctx).extradata, (*ctx).extradata_size as usize)
                        .to_vec(),
                );
            }
            self.ctx = Some(ctx);
            self.dims = (settings.width as i32, settings.height as i32);
        }
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame, keyframe: bool) -> Result<(), EncodeError> {
        let ctx = self.ctx.ok_or(EncodeError::NotConfigured)?;
        unsafe {
            let src_w = frame.width as i32;
            let src_h = frame.height as i32;
            if self.sws.is_null() || self.sws_src != (src_w, src_h) {
                if !self.sws.is_null() {
                    ffi::sws_freeContext(self.sws);
                }
                self.sws = ffi::sws_getContext(
                    src_w,
                    src_h,
                    ffi::AVPixelFormat::AV_PIX_FMT_RGBA,
                    self.dims.0,
                    self.dims.1,
                    ffi::AVPixelFormat::AV_PIX_FMT_YUV420P,
                    ffi::SWS_BILINEAR as i32,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                );
                self.sws_src = (src_w, src_h);
            }
            if self.sws.is_null() {
                return Err(EncodeError::Backend("sws_getContext failed".to_string()));
            }

            let av_frame = ffi::av_frame_alloc();
            if av_frame.is_null() {
                return Err(EncodeError::Backend("av_frame_alloc failed".to_string()));
            }
            (*av_frame).format = ffi::AVPixelFormat::AV_PIX_FMT_YUV420P as i32;
            (*av_frame).width = self.dims.0;
            (*av_frame).height = self.dims.1;
            let ret = ffi::av_frame_get_buffer(av_frame, 0);
            if ret < 0 {
                let mut av_frame = av_frame;
                ffi::av_frame_free(&mut av_frame);
                return Err(EncodeError::Backend(format!(
                    "av_frame_get_buffer returned {}",
                    ret
                )));
            }

            let src_planes: [*const u8; 4] = [frame.data.as_ptr(), ptr::null(), ptr::null(), ptr::null()];
            let src_strides: [i32; 4] = [src_w * 4, 0, 0, 0];
            ffi::sws_scale(
                self.sws,
                src_planes.as_ptr(),
                src_strides.as_ptr(),
                0,
                src_h,
                (*av_frame).data.as_mut_ptr(),
                (*av_frame).linesize.as_mut_ptr(),
            );

            (*av_frame).pts = frame.timestamp;
            (*av_frame).duration = frame.duration;
            if keyframe {
                (*av_frame).pict_type = ffi::AVPictureType::AV_PICTURE_TYPE_I;
            }

            let ret = ffi::avcodec_send_frame(ctx, av_frame);
            let mut av_frame = av_frame;
            ffi::av_frame_free(&mut av_frame);
            if ret < 0 {
                return Err(EncodeError::Backend(format!(
                    "avcodec_send_frame returned {}",
                    ret
                )));
            }
            self.receive_packets(ctx).map_err(EncodeError::Backend)?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<EncodedPacket> {
        std::mem::take(&mut self.pending)
    }

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EncodeError> {
        if let Some(ctx) = self.ctx {
            unsafe {
                ffi::avcodec_send_frame(ctx, ptr::null());
                self.receive_packets(ctx).map_err(EncodeError::Backend)?;
            }
        }
        Ok(std::mem::take(&mut self.pending))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.close();
    }

    fn description(&self) -> Option<&[u8]> {
        self.description.as_deref()
    }
}

impl Drop for FfmpegVideoEncoder {
    fn drop(&mut self) {
        self.close();
    }
}
