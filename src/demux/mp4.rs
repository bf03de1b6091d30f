//! ISO-BMFF (MP4) parsing over an in-memory upload.
//!
//! Parsing happens in two phases: `Mp4Demuxer::new` walks the box tree and
//! collects movie and per-track metadata (surfaced via [`ContainerInfo`]
//! without touching sample payloads), then [`Mp4Demuxer::extract`] walks the
//! sample tables and materializes every sample as an [`EncodedChunk`].

use std::sync::Arc;

use tracing::debug;

use crate::core::chunk::{ChunkKind, ChunkList, EncodedChunk};
use crate::core::config::{AudioCodecConfig, VideoCodecConfig};
use crate::core::time::{self, TimeUs};
use crate::demux::DemuxError;

const fn tag(name: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*name)
}

const MOOV: u32 = tag(b"moov");
const MVHD: u32 = tag(b"mvhd");
const TRAK: u32 = tag(b"trak");
const MDIA: u32 = tag(b"mdia");
const MDHD: u32 = tag(b"mdhd");
const HDLR: u32 = tag(b"hdlr");
const MINF: u32 = tag(b"minf");
const STBL: u32 = tag(b"stbl");
const STSD: u32 = tag(b"stsd");
const STTS: u32 = tag(b"stts");
const CTTS: u32 = tag(b"ctts");
const STSC: u32 = tag(b"stsc");
const STSZ: u32 = tag(b"stsz");
const STCO: u32 = tag(b"stco");
const CO64: u32 = tag(b"co64");
const STSS: u32 = tag(b"stss");
const AVC1: u32 = tag(b"avc1");
const AVCC: u32 = tag(b"avcC");
const MP4A: u32 = tag(b"mp4a");
const ESDS: u32 = tag(b"esds");
const HANDLER_VIDEO: u32 = tag(b"vide");
const HANDLER_AUDIO: u32 = tag(b"soun");

/// Bounds-checked big-endian reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DemuxError> {
        if self.remaining() < n {
            return Err(DemuxError::Truncated(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), DemuxError> {
        self.take(n).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, DemuxError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DemuxError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DemuxError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DemuxError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Next child box: `(fourcc, body reader)`. Handles 64-bit and
    /// to-end-of-enclosure sizes. `None` once the enclosure is exhausted.
    fn next_box(&mut self) -> Result<Option<(u32, Reader<'a>)>, DemuxError> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        let size32 = self.read_u32()? as u64;
        let kind = self.read_u32()?;
        let body_len = match size32 {
            0 => self.remaining(),
            1 => {
                let size64 = self.read_u64()?;
                if size64 < 16 {
                    return Err(DemuxError::Malformed("box", "64-bit size below header size"));
                }
                (size64 - 16) as usize
            }
            2..=7 => return Err(DemuxError::Malformed("box", "size below header size")),
            n => (n - 8) as usize,
        };
        let body = self.take(body_len)?;
        Ok(Some((kind, Reader::new(body))))
    }
}

/// Run-length table walker (`stts`/`ctts` style `(count, value)` entries).
struct RunIter<'a, T: Copy> {
    runs: &'a [(u32, T)],
    index: usize,
    used: u32,
    default: T,
}

impl<'a, T: Copy> RunIter<'a, T> {
    fn new(runs: &'a [(u32, T)], default: T) -> Self {
        Self {
            runs,
            index: 0,
            used: 0,
            default,
        }
    }

    fn next(&mut self) -> T {
        while self.index < self.runs.len() && self.used >= self.runs[self.index].0 {
            self.index += 1;
            self.used = 0;
        }
        match self.runs.get(self.index) {
            Some(&(_, value)) => {
                self.used += 1;
                value
            }
            None => self.default,
        }
    }
}

#[derive(Default)]
struct SampleTables {
    time_to_sample: Vec<(u32, u32)>,
    composition_offsets: Vec<(u32, i32)>,
    sample_to_chunk: Vec<(u32, u32)>,
    sample_sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
    sync_samples: Vec<u32>,
}

struct VideoMeta {
    codec: String,
    width: u32,
    height: u32,
    description: Option<Arc<[u8]>>,
}

struct AudioMeta {
    codec: String,
    sample_rate: u32,
    channel_count: u32,
    description: Option<Arc<[u8]>>,
}

#[derive(PartialEq)]
enum TrackKind {
    Video,
    Audio,
    Other,
}

struct TrackMeta {
    kind: TrackKind,
    timescale: u32,
    duration: u64,
    video: Option<VideoMeta>,
    audio: Option<AudioMeta>,
    tables: SampleTables,
}

/// Per-track metadata available before any sample payload is read.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub duration_us: TimeUs,
    pub video: Vec<VideoStreamInfo>,
    pub audio: Vec<AudioStreamInfo>,
}

#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
    pub duration_us: TimeUs,
    pub sample_count: usize,
}

#[derive(Debug, Clone)]
pub struct AudioStreamInfo {
    pub codec: String,
    pub sample_rate: u32,
    pub channel_count: u32,
    pub timescale: u32,
    pub duration_us: TimeUs,
    pub sample_count: usize,
}

/// One fully extracted video track.
#[derive(Debug, Clone)]
pub struct VideoTrackSource {
    pub config: VideoCodecConfig,
    pub chunks: ChunkList,
    pub timescale: u32,
    pub duration_us: TimeUs,
}

/// One fully extracted audio track.
#[derive(Debug, Clone)]
pub struct AudioTrackSource {
    pub config: AudioCodecConfig,
    pub chunks: ChunkList,
    pub timescale: u32,
    pub duration_us: TimeUs,
}

/// Everything a container yields: decode-ordered chunk lists per track plus
/// the presentation duration.
#[derive(Debug, Clone)]
pub struct DemuxOutput {
    pub video: Vec<VideoTrackSource>,
    pub audio: Vec<AudioTrackSource>,
    pub duration_us: TimeUs,
}

/// Parsed container held against the upload bytes.
pub struct Mp4Demuxer<'a> {
    data: &'a [u8],
    movie_timescale: u32,
    movie_duration: u64,
    tracks: Vec<TrackMeta>,
}

/// Parse metadata only.
pub fn probe(data: &[u8]) -> Result<ContainerInfo, DemuxError> {
    Mp4Demuxer::new(data).map(|d| d.info())
}

/// Parse and extract every sample.
pub fn demux(data: &[u8]) -> Result<DemuxOutput, DemuxError> {
    Mp4Demuxer::new(data)?.extract()
}

impl<'a> Mp4Demuxer<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, DemuxError> {
        let mut reader = Reader::new(data);
        let mut moov = None;
        while let Some((kind, body)) = reader.next_box()? {
            if kind == MOOV {
                moov = Some(body);
            }
        }
        let mut moov = moov.ok_or(DemuxError::MissingMoov)?;

        let mut demuxer = Self {
            data,
            movie_timescale: 1_000,
            movie_duration: 0,
            tracks: Vec::new(),
        };
        while let Some((kind, body)) = moov.next_box()? {
            match kind {
                MVHD => demuxer.parse_mvhd(body)?,
                TRAK => demuxer.parse_trak(body)?,
                _ => {}
            }
        }
        if !demuxer.tracks.iter().any(|t| t.kind != TrackKind::Other) {
            return Err(DemuxError::NoTracks);
        }
        Ok(demuxer)
    }

    /// Track metadata, available before extraction touches any payload.
    pub fn info(&self) -> ContainerInfo {
        let mut video = Vec::new();
        let mut audio = Vec::new();
        for track in &self.tracks {
            let duration_us = time::from_timescale(track.duration as i64, track.timescale);
            if let Some(v) = &track.video {
                video.push(VideoStreamInfo {
                    codec: v.codec.clone(),
                    width: v.width,
                    height: v.height,
                    timescale: track.timescale,
                    duration_us,
                    sample_count: track.tables.sample_sizes.len(),
                });
            }
            if let Some(a) = &track.audio {
                audio.push(AudioStreamInfo {
                    codec: a.codec.clone(),
                    sample_rate: a.sample_rate,
                    channel_count: a.channel_count,
                    timescale: track.timescale,
                    duration_us,
                    sample_count: track.tables.sample_sizes.len(),
                });
            }
        }
        ContainerInfo {
            duration_us: time::from_timescale(self.movie_duration as i64, self.movie_timescale),
            video,
            audio,
        }
    }

    /// Exhaustively extract all samples of every decodable track.
    pub fn extract(&self) -> Result<DemuxOutput, DemuxError> {
        let info = self.info();
        let mut video = Vec::new();
        let mut audio = Vec::new();
        for track in &self.tracks {
            let duration_us = time::from_timescale(track.duration as i64, track.timescale);
            if let Some(v) = &track.video {
                let chunks = self.build_chunks(track, false)?;
                debug!(
                    codec = v.codec.as_str(),
                    samples = chunks.len(),
                    "extracted video track"
                );
                video.push(VideoTrackSource {
                    config: VideoCodecConfig::new(
                        v.codec.clone(),
                        v.width,
                        v.height,
                        v.description.clone(),
                    ),
                    chunks,
                    timescale: track.timescale,
                    duration_us,
                });
            } else if let Some(a) = &track.audio {
                let chunks = self.build_chunks(track, true)?;
                debug!(
                    codec = a.codec.as_str(),
                    samples = chunks.len(),
                    "extracted audio track"
                );
                audio.push(AudioTrackSource {
                    config: AudioCodecConfig::new(
                        a.codec.clone(),
                        a.sample_rate,
                        a.channel_count,
                        a.description.clone(),
                    ),
                    chunks,
                    timescale: track.timescale,
                    duration_us,
                });
            }
        }
        Ok(DemuxOutput {
            video,
            audio,
            duration_us: info.duration_us,
        })
    }

    fn parse_mvhd(&mut self, mut body: Reader<'a>) -> Result<(), DemuxError> {
        let version = body.read_u8()?;
        body.skip(3)?;
        if version == 1 {
            body.skip(16)?;
            self.movie_timescale = body.read_u32()?;
            self.movie_duration = body.read_u64()?;
        } else {
            body.skip(8)?;
            self.movie_timescale = body.read_u32()?;
            self.movie_duration = body.read_u32()? as u64;
        }
        if self.movie_timescale == 0 {
            return Err(DemuxError::Malformed("mvhd", "zero timescale"));
        }
        Ok(())
    }

    fn parse_trak(&mut self, mut body: Reader<'a>) -> Result<(), DemuxError> {
        let mut track = TrackMeta {
            kind: TrackKind::Other,
            timescale: 1_000,
            duration: 0,
            video: None,
            audio: None,
            tables: SampleTables::default(),
        };
        while let Some((kind, child)) = body.next_box()? {
            if kind == MDIA {
                self.parse_mdia(child, &mut track)?;
            }
        }
        self.tracks.push(track);
        Ok(())
    }

    fn parse_mdia(&mut self, mut body: Reader<'a>, track: &mut TrackMeta) -> Result<(), DemuxError> {
        while let Some((kind, mut child)) = body.next_box()? {
            match kind {
                MDHD => {
                    let version = child.read_u8()?;
                    child.skip(3)?;
                    if version == 1 {
                        child.skip(16)?;
                        track.timescale = child.read_u32()?;
                        track.duration = child.read_u64()?;
                    } else {
                        child.skip(8)?;
                        track.timescale = child.read_u32()?;
                        track.duration = child.read_u32()? as u64;
                    }
                    if track.timescale == 0 {
                        return Err(DemuxError::Malformed("mdhd", "zero timescale"));
                    }
                }
                HDLR => {
                    child.skip(8)?;
                    track.kind = match child.read_u32()? {
                        HANDLER_VIDEO => TrackKind::Video,
                        HANDLER_AUDIO => TrackKind::Audio,
                        _ => TrackKind::Other,
                    };
                }
                MINF => self.parse_minf(child, track)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_minf(&mut self, mut body: Reader<'a>, track: &mut TrackMeta) -> Result<(), DemuxError> {
        while let Some((kind, child)) = body.next_box()? {
            if kind == STBL {
                self.parse_stbl(child, track)?;
            }
        }
        Ok(())
    }

    fn parse_stbl(&mut self, mut body: Reader<'a>, track: &mut TrackMeta) -> Result<(), DemuxError> {
        while let Some((kind, mut child)) = body.next_box()? {
            match kind {
                STSD => self.parse_stsd(child, track)?,
                STTS => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        let count = child.read_u32()?;
                        let delta = child.read_u32()?;
                        track.tables.time_to_sample.push((count, delta));
                    }
                }
                CTTS => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        let count = child.read_u32()?;
                        let offset = child.read_u32()? as i32;
                        track.tables.composition_offsets.push((count, offset));
                    }
                }
                STSC => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        let first_chunk = child.read_u32()?;
                        let samples_per_chunk = child.read_u32()?;
                        child.skip(4)?; // sample description index
                        track
                            .tables
                            .sample_to_chunk
                            .push((first_chunk, samples_per_chunk));
                    }
                }
                STSZ => {
                    child.skip(4)?;
                    let uniform_size = child.read_u32()?;
                    let count = child.read_u32()?;
                    if uniform_size == 0 {
                        for _ in 0..count {
                            track.tables.sample_sizes.push(child.read_u32()?);
                        }
                    } else {
                        track.tables.sample_sizes = vec![uniform_size; count as usize];
                    }
                }
                STCO => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        track.tables.chunk_offsets.push(child.read_u32()? as u64);
                    }
                }
                CO64 => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        track.tables.chunk_offsets.push(child.read_u64()?);
                    }
                }
                STSS => {
                    child.skip(4)?;
                    let entries = child.read_u32()?;
                    for _ in 0..entries {
                        track.tables.sync_samples.push(child.read_u32()?);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_stsd(&mut self, mut body: Reader<'a>, track: &mut TrackMeta) -> Result<(), DemuxError> {
        body.skip(4)?;
        let entry_count = body.read_u32()?;
        if entry_count == 0 {
            return Ok(());
        }
        let Some((entry_kind, mut entry)) = body.next_box()? else {
            return Err(DemuxError::Malformed("stsd", "entry count without entries"));
        };
        match (&track.kind, entry_kind) {
            (TrackKind::Video, AVC1) => {
                entry.skip(24)?;
                let width = entry.read_u16()? as u32;
                let height = entry.read_u16()? as u32;
                entry.skip(50)?;
                let mut description = None;
                while let Some((child_kind, child)) = entry.next_box()? {
                    if child_kind == AVCC {
                        description = Some(Arc::<[u8]>::from(child.data));
                    }
                }
                let Some(description) = description else {
                    return Err(DemuxError::Malformed("avc1", "missing avcC"));
                };
                if description.len() < 4 {
                    return Err(DemuxError::Malformed("avcC", "record shorter than 4 bytes"));
                }
                let codec = format!(
                    "avc1.{:02X}{:02X}{:02X}",
                    description[1], description[2], description[3]
                );
                track.video = Some(VideoMeta {
                    codec,
                    width,
                    height,
                    description: Some(description),
                });
            }
            (TrackKind::Audio, MP4A) => {
                entry.skip(16)?;
                let channel_count = entry.read_u16()? as u32;
                entry.skip(6)?;
                let sample_rate = entry.read_u32()? >> 16;
                let mut description = None;
                while let Some((child_kind, child)) = entry.next_box()? {
                    if child_kind == ESDS {
                        description = parse_esds(child)?;
                    }
                }
                let object_type = description
                    .as_deref()
                    .filter(|asc: &&[u8]| !asc.is_empty())
                    .map_or(2, |asc| asc[0] >> 3);
                track.audio = Some(AudioMeta {
                    codec: format!("mp4a.40.{}", object_type),
                    sample_rate,
                    channel_count,
                    description,
                });
            }
            (TrackKind::Video | TrackKind::Audio, other) => {
                return Err(DemuxError::UnsupportedCodec(other));
            }
            (TrackKind::Other, _) => {}
        }
        Ok(())
    }

    /// Walk the sample tables and slice every payload out of the upload.
    fn build_chunks(&self, track: &TrackMeta, all_key: bool) -> Result<ChunkList, DemuxError> {
        let spans = sample_spans(&track.tables, self.data.len())?;
        let mut chunks = Vec::with_capacity(spans.len());
        let mut deltas = RunIter::new(&track.tables.time_to_sample, 0u32);
        let mut ctts = RunIter::new(&track.tables.composition_offsets, 0i32);
        let mut dts: i64 = 0;

        for (index, &(offset, size)) in spans.iter().enumerate() {
            let delta = deltas.next() as i64;
            let pts = dts + ctts.next() as i64;
            let timestamp = time::from_timescale(pts, track.timescale);
            let duration =
                time::from_timescale(pts + delta, track.timescale).saturating_sub(timestamp);
            let kind = if all_key || is_sync_sample(&track.tables.sync_samples, index) {
                ChunkKind::Key
            } else {
                ChunkKind::Delta
            };
            let payload = &self.data[offset as usize..(offset + size as u64) as usize];
            chunks.push(EncodedChunk::new(
                timestamp,
                duration,
                kind,
                Arc::from(payload),
            ));
            dts += delta;
        }

        if chunks.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return Err(DemuxError::UnsupportedLayout(
                "presentation order differs from decode order",
            ));
        }
        Ok(ChunkList::new(chunks))
    }
}

fn is_sync_sample(sync_samples: &[u32], index: usize) -> bool {
    if sync_samples.is_empty() {
        return true;
    }
    sync_samples.binary_search(&(index as u32 + 1)).is_ok()
}

/// Expand stsc/stco/stsz into one absolute `(offset, size)` span per sample,
/// bounds-checked against the container length.
fn sample_spans(tables: &SampleTables, file_len: usize) -> Result<Vec<(u64, u32)>, DemuxError> {
    let total = tables.sample_sizes.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    if tables.sample_to_chunk.is_empty() || tables.chunk_offsets.is_empty() {
        return Err(DemuxError::Malformed("stbl", "missing sample-to-chunk mapping"));
    }

    let stsc = &tables.sample_to_chunk;
    let mut spans = Vec::with_capacity(total);
    let mut sample = 0usize;

    'runs: for (i, &(first_chunk, samples_per_chunk)) in stsc.iter().enumerate() {
        let first = first_chunk.saturating_sub(1) as usize;
        let next_first = match stsc.get(i + 1) {
            Some(&(next, _)) => next.saturating_sub(1) as usize,
            None => tables.chunk_offsets.len(),
        };
        for chunk in first..next_first {
            let Some(&base) = tables.chunk_offsets.get(chunk) else {
                break 'runs;
            };
            let mut offset = base;
            for _ in 0..samples_per_chunk {
                if sample >= total {
                    break 'runs;
                }
                let size = tables.sample_sizes[sample];
                let end = offset + size as u64;
                if end > file_len as u64 {
                    return Err(DemuxError::SampleOutOfBounds {
                        index: sample,
                        offset,
                        offset_end: end,
                        len: file_len,
                    });
                }
                spans.push((offset, size));
                offset = end;
                sample += 1;
            }
        }
    }

    if sample < total {
        return Err(DemuxError::Malformed(
            "stsc",
            "maps fewer samples than stsz declares",
        ));
    }
    Ok(spans)
}

/// Pull the AudioSpecificConfig out of an esds box, if present.
fn parse_esds(mut body: Reader<'_>) -> Result<Option<Arc<[u8]>>, DemuxError> {
    fn descriptor(r: &mut Reader<'_>) -> Result<(u8, usize), DemuxError> {
        let tag = r.read_u8()?;
        let mut len = 0usize;
        for _ in 0..4 {
            let byte = r.read_u8()?;
            len = (len << 7) | (byte & 0x7F) as usize;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok((tag, len))
    }

    body.skip(4)?; // version + flags
    let (es_tag, _) = descriptor(&mut body)?;
    if es_tag != 0x03 {
        return Err(DemuxError::Malformed("esds", "expected ES descriptor"));
    }
    body.skip(3)?; // es_id + stream priority flags
    let (config_tag, _) = descriptor(&mut body)?;
    if config_tag != 0x04 {
        return Err(DemuxError::Malformed("esds", "expected decoder config"));
    }
    body.skip(13)?; // object type, stream type, buffer size, bitrates
    let (specific_tag, len) = descriptor(&mut body)?;
    if specific_tag != 0x05 {
        return Ok(None);
    }
    Ok(Some(Arc::from(body.take(len)?)))
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Hand-assembled container bytes for parser tests.

    pub fn boxed(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(payload);
        out
    }

    pub fn full_box(name: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![version, 0, 0, 0];
        body.extend_from_slice(payload);
        boxed(name, &body)
    }

    pub fn u16be(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }

    pub fn u32be(v: u32) -> [u8; 4] {
        v.to_be_bytes()
    }

    pub fn entries_u32(values: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&u32be(values.len() as u32));
        for v in values {
            out.extend_from_slice(&u32be(*v));
        }
        out
    }

    /// Minimal one-video-track file: `count` samples of `size` bytes, 90 kHz
    /// timescale, fixed `delta` units apiece, key chunk every `sync_every`.
    pub fn video_file(count: u32, size: u32, delta: u32, sync_every: u32) -> Vec<u8> {
        let ftyp = boxed(b"ftyp", b"isom\x00\x00\x02\x00isomavc1");
        let payload: Vec<u8> = (0..count * size).map(|i| i as u8).collect();
        let mdat = boxed(b"mdat", &payload);
        let data_offset = (ftyp.len() + 8) as u32;

        let avcc = boxed(b"avcC", &[1, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00]);
        let mut avc1 = Vec::new();
        avc1.extend_from_slice(&[0u8; 24]);
        avc1.extend_from_slice(&u16be(320));
        avc1.extend_from_slice(&u16be(240));
        avc1.extend_from_slice(&[0u8; 50]);
        avc1.extend_from_slice(&avcc);
        let avc1 = boxed(b"avc1", &avc1);

        let mut stsd = Vec::new();
        stsd.extend_from_slice(&u32be(1));
        stsd.extend_from_slice(&avc1);
        let stsd = full_box(b"stsd", 0, &stsd);

        let stts = full_box(b"stts", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&u32be(1));
            v.extend_from_slice(&u32be(count));
            v.extend_from_slice(&u32be(delta));
            v
        });
        let stsc = full_box(b"stsc", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&u32be(1));
            v.extend_from_slice(&u32be(1));
            v.extend_from_slice(&u32be(count));
            v.extend_from_slice(&u32be(1));
            v
        });
        let stsz = full_box(b"stsz", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&u32be(size));
            v.extend_from_slice(&u32be(count));
            v
        });
        let stco = full_box(b"stco", 0, &entries_u32(&[data_offset]));
        let sync: Vec<u32> = (0..count).step_by(sync_every.max(1) as usize).map(|i| i + 1).collect();
        let stss = full_box(b"stss", 0, &entries_u32(&sync));

        let mut stbl = Vec::new();
        for b in [&stsd, &stts, &stsc, &stsz, &stco, &stss] {
            stbl.extend_from_slice(b);
        }
        let stbl = boxed(b"stbl", &stbl);
        let minf = boxed(b"minf", &stbl);

        let mdhd = full_box(b"mdhd", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&[0u8; 8]);
            v.extend_from_slice(&u32be(90_000));
            v.extend_from_slice(&u32be(count * delta));
            v.extend_from_slice(&[0x55, 0xC4, 0, 0]);
            v
        });
        let hdlr = full_box(b"hdlr", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&[0u8; 4]);
            v.extend_from_slice(b"vide");
            v.extend_from_slice(&[0u8; 12]);
            v
        });
        let mut mdia = Vec::new();
        mdia.extend_from_slice(&mdhd);
        mdia.extend_from_slice(&hdlr);
        mdia.extend_from_slice(&minf);
        let mdia = boxed(b"mdia", &mdia);
        let trak = boxed(b"trak", &mdia);

        let mvhd = full_box(b"mvhd", 0, &{
            let mut v = Vec::new();
            v.extend_from_slice(&[0u8; 8]);
            v.extend_from_slice(&u32be(1_000));
            v.extend_from_slice(&u32be(count * delta / 90));
            v
        });
        let mut moov = Vec::new();
        moov.extend_from_slice(&mvhd);
        moov.extend_from_slice(&trak);
        let moov = boxed(b"moov", &moov);

        let mut file = Vec::new();
        file.extend_from_slice(&ftyp);
        file.extend_from_slice(&mdat);
        file.extend_from_slice(&moov);
        file
    }
}
