//! MP4 writer.
//!
//! Samples arrive one at a time and land in a growing `mdat` payload while
//! per-track tables (timing deltas, sync flags, sizes, offsets) accumulate
//! beside them. `finalize` then serializes `ftyp` + `mdat` + `moov` in one
//! pass. Output timescales are fixed: video 90 kHz, audio 48 kHz. Everything
//! written here parses back through [`crate::demux::demux`].

use crate::core::chunk::EncodedChunk;
use crate::core::time::{self, TimeUs};
use crate::decode::backend::EncodedPacket;
use crate::mux::writer::{descriptor, BoxWriter};
use crate::mux::MuxError;

pub const VIDEO_TIMESCALE: u32 = 90_000;
pub const AUDIO_TIMESCALE: u32 = 48_000;
const MOVIE_TIMESCALE: u32 = 1_000;

const MATRIX_IDENTITY: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// Per-track sample table accumulator.
///
/// Starts are kept in timescale units relative to the first sample, so the
/// serialized decode timeline begins at zero regardless of what the caller's
/// timestamps were anchored to.
struct Samples {
    timescale: u32,
    base: Option<i64>,
    starts: Vec<i64>,
    end: i64,
    sizes: Vec<u32>,
    /// Offsets into the mdat payload, in push order.
    offsets: Vec<u32>,
    /// 1-based indices of sync samples.
    sync: Vec<u32>,
}

impl Samples {
    fn new(timescale: u32) -> Self {
        Self {
            timescale,
            base: None,
            starts: Vec::new(),
            end: 0,
            sizes: Vec::new(),
            offsets: Vec::new(),
            sync: Vec::new(),
        }
    }

    fn push(
        &mut self,
        track: &'static str,
        offset: u32,
        size: u32,
        timestamp: TimeUs,
        duration: TimeUs,
        is_key: bool,
    ) -> Result<(), MuxError> {
        let units = time::to_timescale(timestamp, self.timescale);
        let base = *self.base.get_or_insert(units);
        let start = units - base;
        if self.starts.last().is_some_and(|&prev| start < prev) {
            return Err(MuxError::NonMonotonic { track, timestamp });
        }
        self.starts.push(start);
        self.end = self
            .end
            .max(start + time::to_timescale(duration, self.timescale));
        self.sizes.push(size);
        self.offsets.push(offset);
        if is_key {
            self.sync.push(self.starts.len() as u32);
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.starts.len()
    }

    /// Decode deltas for stts: the spacing to the next sample, with the last
    /// sample keeping its own duration.
    fn deltas(&self) -> Vec<u32> {
        let mut deltas = Vec::with_capacity(self.starts.len());
        for (i, &start) in self.starts.iter().enumerate() {
            let next = match self.starts.get(i + 1) {
                Some(&next) => next,
                None => self.end,
            };
            deltas.push((next - start).clamp(0, u32::MAX as i64) as u32);
        }
        deltas
    }

    fn duration_units(&self) -> u32 {
        self.end.clamp(0, u32::MAX as i64) as u32
    }

    fn movie_duration_units(&self) -> u32 {
        time::rescale(self.end, self.timescale, MOVIE_TIMESCALE).clamp(0, u32::MAX as i64) as u32
    }
}

struct VideoTrack {
    width: u32,
    height: u32,
    /// avcC decoder configuration record.
    description: Vec<u8>,
    samples: Samples,
}

struct AudioTrack {
    sample_rate: u32,
    channel_count: u32,
    /// AudioSpecificConfig; `None` omits the esds box.
    description: Option<Vec<u8>>,
    samples: Samples,
}

/// Incremental single-pass MP4 muxer: one optional video track, one optional
/// audio track, payloads appended to a shared mdat in push order.
pub struct Mp4Muxer {
    mdat: Vec<u8>,
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
}

impl Default for Mp4Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp4Muxer {
    pub fn new() -> Self {
        Self {
            mdat: Vec::new(),
            video: None,
            audio: None,
        }
    }

    pub fn add_video_track(&mut self, width: u32, height: u32, description: Vec<u8>) {
        self.video = Some(VideoTrack {
            width,
            height,
            description,
            samples: Samples::new(VIDEO_TIMESCALE),
        });
    }

    pub fn add_audio_track(
        &mut self,
        sample_rate: u32,
        channel_count: u32,
        description: Option<Vec<u8>>,
    ) {
        self.audio = Some(AudioTrack {
            sample_rate,
            channel_count,
            description,
            samples: Samples::new(AUDIO_TIMESCALE),
        });
    }

    /// Append one encoded video sample. The very first sample carries the
    /// encoder's in-band parameter sets as a length-prefixed blob; that prefix
    /// duplicates the avcC record and is stripped before storage.
    pub fn push_video(&mut self, packet: &EncodedPacket) -> Result<(), MuxError> {
        let track = self.video.as_mut().ok_or(MuxError::MissingTrack("video"))?;
        let payload = if track.samples.count() == 0 {
            strip_parameter_prefix(&packet.data)?
        } else {
            &packet.data[..]
        };
        let offset = self.mdat.len() as u32;
        self.mdat.extend_from_slice(payload);
        track.samples.push(
            "video",
            offset,
            payload.len() as u32,
            packet.timestamp,
            packet.duration,
            packet.is_key,
        )
    }

    /// Append one audio sample unchanged (passthrough, no re-encode).
    pub fn push_audio(&mut self, chunk: &EncodedChunk) -> Result<(), MuxError> {
        let track = self.audio.as_mut().ok_or(MuxError::MissingTrack("audio"))?;
        let offset = self.mdat.len() as u32;
        self.mdat.extend_from_slice(&chunk.data);
        track.samples.push(
            "audio",
            offset,
            chunk.data.len() as u32,
            chunk.timestamp,
            chunk.duration,
            chunk.is_key(),
        )
    }

    pub fn has_video_track(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio_track(&self) -> bool {
        self.audio.is_some()
    }

    pub fn video_sample_count(&self) -> usize {
        self.video.as_ref().map_or(0, |t| t.samples.count())
    }

    pub fn audio_sample_count(&self) -> usize {
        self.audio.as_ref().map_or(0, |t| t.samples.count())
    }

    /// Serialize the finished container.
    pub fn finalize(self) -> Result<Vec<u8>, MuxError> {
        if self.video.is_none() && self.audio.is_none() {
            return Err(MuxError::NoTracks);
        }
        let ftyp = ftyp();
        // Absolute position of the first mdat payload byte; every stco entry
        // is an offset into the payload shifted by this.
        let payload_base = ftyp.len() as u32 + 8;

        let movie_duration = self
            .video
            .iter()
            .map(|t| t.samples.movie_duration_units())
            .chain(self.audio.iter().map(|t| t.samples.movie_duration_units()))
            .max()
            .unwrap_or(0);

        let mut moov = BoxWriter::new();
        let track_count = self.video.is_some() as u32 + self.audio.is_some() as u32;
        moov.child(mvhd(movie_duration, track_count + 1));
        let mut track_id = 1;
        if let Some(video) = &self.video {
            moov.child(video_trak(video, track_id, movie_duration, payload_base));
            track_id += 1;
        }
        if let Some(audio) = &self.audio {
            moov.child(audio_trak(audio, track_id, movie_duration, payload_base));
        }
        let moov = moov.seal(b"moov");

        let mut out = Vec::with_capacity(ftyp.len() + 8 + self.mdat.len() + moov.len());
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&(self.mdat.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(b"mdat");
        out.extend_from_slice(&self.mdat);
        out.extend_from_slice(&moov);
        Ok(out)
    }
}

/// Split the first video sample's parameter prefix off: four length bytes,
/// that many prefix bytes, then the actual payload.
fn strip_parameter_prefix(data: &[u8]) -> Result<&[u8], MuxError> {
    if data.len() < 4 {
        return Err(MuxError::PrefixOutOfBounds {
            prefix_end: 4,
            len: data.len(),
        });
    }
    let declared = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let prefix_end = 4 + declared;
    if prefix_end > data.len() {
        return Err(MuxError::PrefixOutOfBounds {
            prefix_end,
            len: data.len(),
        });
    }
    Ok(&data[prefix_end..])
}

fn ftyp() -> Vec<u8> {
    let mut b = BoxWriter::new();
    b.bytes(b"isom");
    b.u32(0x200);
    b.bytes(b"isomiso2avc1mp41");
    b.seal(b"ftyp")
}

fn mvhd(duration: u32, next_track_id: u32) -> Vec<u8> {
    let mut b = BoxWriter::full(0, 0);
    b.u32(0); // creation time
    b.u32(0); // modification time
    b.u32(MOVIE_TIMESCALE);
    b.u32(duration);
    b.u32(0x0001_0000); // rate 1.0
    b.u16(0x0100); // volume 1.0
    b.zeros(10);
    for value in MATRIX_IDENTITY {
        b.u32(value);
    }
    b.zeros(24); // pre_defined
    b.u32(next_track_id);
    b.seal(b"mvhd")
}

fn tkhd(track_id: u32, movie_duration: u32, width: u32, height: u32, volume: u16) -> Vec<u8> {
    // flags: track enabled + in movie
    let mut b = BoxWriter::full(0, 3);
    b.u32(0); // creation time
    b.u32(0); // modification time
    b.u32(track_id);
    b.u32(0); // reserved
    b.u32(movie_duration);
    b.zeros(8);
    b.u16(0); // layer
    b.u16(0); // alternate group
    b.u16(volume);
    b.u16(0); // reserved
    for value in MATRIX_IDENTITY {
        b.u32(value);
    }
    b.u32(width << 16);
    b.u32(height << 16);
    b.seal(b"tkhd")
}

fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut b = BoxWriter::full(0, 0);
    b.u32(0); // creation time
    b.u32(0); // modification time
    b.u32(timescale);
    b.u32(duration);
    b.u16(0x55C4); // language "und"
    b.u16(0); // pre_defined
    b.seal(b"mdhd")
}

fn hdlr(handler: &[u8; 4], name: &str) -> Vec<u8> {
    let mut b = BoxWriter::full(0, 0);
    b.u32(0); // pre_defined
    b.bytes(handler);
    b.zeros(12);
    b.bytes(name.as_bytes());
    b.u8(0);
    b.seal(b"hdlr")
}

fn vmhd() -> Vec<u8> {
    let mut b = BoxWriter::full(0, 1);
    b.u16(0); // graphics mode: copy
    b.zeros(6); // opcolor
    b.seal(b"vmhd")
}

fn smhd() -> Vec<u8> {
    let mut b = BoxWriter::full(0, 0);
    b.u16(0); // balance: center
    b.u16(0); // reserved
    b.seal(b"smhd")
}

fn dinf() -> Vec<u8> {
    // Single self-contained data reference.
    let url = BoxWriter::full(0, 1).seal(b"url ");
    let mut dref = BoxWriter::full(0, 0);
    dref.u32(1);
    dref.child(url);
    let mut b = BoxWriter::new();
    b.child(dref.seal(b"dref"));
    b.seal(b"dinf")
}

fn video_trak(track: &VideoTrack, track_id: u32, movie_duration: u32, payload_base: u32) -> Vec<u8> {
    let entry = avc1_entry(track);
    let mut minf = BoxWriter::new();
    minf.child(vmhd());
    minf.child(dinf());
    minf.child(stbl(&track.samples, entry, true, payload_base));

    let mut mdia = BoxWriter::new();
    mdia.child(mdhd(track.samples.timescale, track.samples.duration_units()));
    mdia.child(hdlr(b"vide", "VideoHandler"));
    mdia.child(minf.seal(b"minf"));

    let mut trak = BoxWriter::new();
    trak.child(tkhd(track_id, movie_duration, track.width, track.height, 0));
    trak.child(mdia.seal(b"mdia"));
    trak.seal(b"trak")
}

fn audio_trak(track: &AudioTrack, track_id: u32, movie_duration: u32, payload_base: u32) -> Vec<u8> {
    let entry = mp4a_entry(track);
    let mut minf = BoxWriter::new();
    minf.child(smhd());
    minf.child(dinf());
    minf.child(stbl(&track.samples, entry, false, payload_base));

    let mut mdia = BoxWriter::new();
    mdia.child(mdhd(track.samples.timescale, track.samples.duration_units()));
    mdia.child(hdlr(b"soun", "SoundHandler"));
    mdia.child(minf.seal(b"minf"));

    let mut trak = BoxWriter::new();
    trak.child(tkhd(track_id, movie_duration, 0, 0, 0x0100));
    trak.child(mdia.seal(b"mdia"));
    trak.seal(b"trak")
}

fn avc1_entry(track: &VideoTrack) -> Vec<u8> {
    let mut b = BoxWriter::new();
    b.zeros(6); // reserved
    b.u16(1); // data reference index
    b.zeros(16); // pre_defined + reserved
    b.u16(track.width as u16);
    b.u16(track.height as u16);
    b.u32(0x0048_0000); // horizontal dpi 72.0
    b.u32(0x0048_0000); // vertical dpi 72.0
    b.u32(0); // reserved
    b.u16(1); // frame count per sample
    b.zeros(32); // compressor name
    b.u16(0x0018); // depth
    b.u16(0xFFFF); // pre_defined -1
    b.child(avcc(&track.description));
    b.seal(b"avc1")
}

fn avcc(description: &[u8]) -> Vec<u8> {
    let mut b = BoxWriter::new();
    b.bytes(description);
    b.seal(b"avcC")
}

fn mp4a_entry(track: &AudioTrack) -> Vec<u8> {
    let mut b = BoxWriter::new();
    b.zeros(6); // reserved
    b.u16(1); // data reference index
    b.zeros(8); // version + revision + vendor
    b.u16(track.channel_count as u16);
    b.u16(16); // sample size in bits
    b.u16(0); // pre_defined
    b.u16(0); // reserved
    b.u32(track.sample_rate << 16); // 16.16 fixed point
    if let Some(asc) = &track.description {
        b.child(esds(asc));
    }
    b.seal(b"mp4a")
}

/// Elementary stream descriptor carrying the AudioSpecificConfig.
fn esds(asc: &[u8]) -> Vec<u8> {
    let mut decoder_config = vec![
        0x40, // object type: AAC
        0x15, // stream type: audio, reserved bit set
        0, 0, 0, // buffer size
    ];
    decoder_config.extend_from_slice(&0u32.to_be_bytes()); // max bitrate
    decoder_config.extend_from_slice(&0u32.to_be_bytes()); // avg bitrate
    decoder_config.extend_from_slice(&descriptor(0x05, asc));

    let mut es = vec![0, 0, 0]; // ES id + stream priority
    es.extend_from_slice(&descriptor(0x04, &decoder_config));
    es.extend_from_slice(&descriptor(0x06, &[0x02])); // SL config: MP4

    let mut b = BoxWriter::full(0, 0);
    b.bytes(&descriptor(0x03, &es));
    b.seal(b"esds")
}

fn stbl(samples: &Samples, entry: Vec<u8>, write_sync: bool, payload_base: u32) -> Vec<u8> {
    let mut stsd = BoxWriter::full(0, 0);
    stsd.u32(1);
    stsd.child(entry);

    let deltas = samples.deltas();
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &delta in &deltas {
        match runs.last_mut() {
            Some((count, value)) if *value == delta => *count += 1,
            _ => runs.push((1, delta)),
        }
    }
    let mut stts = BoxWriter::full(0, 0);
    stts.u32(runs.len() as u32);
    for (count, delta) in runs {
        stts.u32(count);
        stts.u32(delta);
    }

    // One chunk per sample keeps the mapping valid for any push interleaving.
    let mut stsc = BoxWriter::full(0, 0);
    stsc.u32(1);
    stsc.u32(1); // first chunk
    stsc.u32(1); // samples per chunk
    stsc.u32(1); // sample description index

    let uniform = samples.sizes.windows(2).all(|w| w[0] == w[1]);
    let mut stsz = BoxWriter::full(0, 0);
    if uniform && !samples.sizes.is_empty() {
        stsz.u32(samples.sizes[0]);
        stsz.u32(samples.sizes.len() as u32);
    } else {
        stsz.u32(0);
        stsz.u32(samples.sizes.len() as u32);
        for &size in &samples.sizes {
            stsz.u32(size);
        }
    }

    let mut stco = BoxWriter::full(0, 0);
    stco.u32(samples.offsets.len() as u32);
    for &offset in &samples.offsets {
        stco.u32(payload_base + offset);
    }

    let mut b = BoxWriter::new();
    b.child(stsd.seal(b"stsd"));
    b.child(stts.seal(b"stts"));
    // Omitting stss marks every sample as a sync point.
    if write_sync && samples.sync.len() < samples.count() {
        let mut stss = BoxWriter::full(0, 0);
        stss.u32(samples.sync.len() as u32);
        for &number in &samples.sync {
            stss.u32(number);
        }
        b.child(stss.seal(b"stss"));
    }
    b.child(stsc.seal(b"stsc"));
    b.child(stsz.seal(b"stsz"));
    b.child(stco.seal(b"stco"));
    b.seal(b"stbl")
}
