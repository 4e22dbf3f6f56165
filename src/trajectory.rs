//! JSON-lines trajectory export.
//!
//! One JSON object per line, tagged by `record`:
//! `header` once, `frame` per written timestep, `splats` at the end.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::particle::Particle;
use crate::tracker::TrackRecord;

#[derive(Clone, Debug, Serialize)]
pub struct RunHeader {
    pub particles: usize,
    pub dt_s: f64,
    pub steps: usize,
    pub space_charge_factor: f64,
    pub solver: String,
}

#[derive(Serialize)]
struct FrameParticle {
    index: usize,
    location: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    velocity: Option<[f64; 3]>,
    active: bool,
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Header(&'a RunHeader),
    Frame {
        timestep: usize,
        time_s: f64,
        particles: Vec<FrameParticle>,
    },
    Splats {
        particles: &'a [TrackRecord],
    },
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Memory(Vec<u8>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
            Sink::Memory(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
            Sink::Memory(w) => w.flush(),
        }
    }
}

pub struct TrajectoryWriter {
    sink: Sink,
    velocities: bool,
    frames: usize,
}

impl TrajectoryWriter {
    pub fn create<P: AsRef<Path>>(path: P, gzip: bool, velocities: bool) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        let sink = if gzip {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        };
        Ok(Self { sink, velocities, frames: 0 })
    }

    /// Writer that keeps the output in memory; see [`TrajectoryWriter::into_bytes`].
    pub fn in_memory(velocities: bool) -> Self {
        Self { sink: Sink::Memory(Vec::new()), velocities, frames: 0 }
    }

    pub fn frames_written(&self) -> usize {
        self.frames
    }

    fn write_record(&mut self, record: &Record<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.sink, record)?;
        self.sink.write_all(b"\n")
    }

    pub fn write_header(&mut self, header: &RunHeader) -> io::Result<()> {
        self.write_record(&Record::Header(header))
    }

    /// Write every particle that has been born by `time`.
    pub fn write_frame(&mut self, particles: &[Particle], time: f64, timestep: usize) -> io::Result<()> {
        let velocities = self.velocities;
        let particles = particles
            .iter()
            .filter(|p| p.is_born(time))
            .map(|p| FrameParticle {
                index: p.index,
                location: [p.location.x, p.location.y, p.location.z],
                velocity: velocities.then(|| [p.velocity.x, p.velocity.y, p.velocity.z]),
                active: p.active,
            })
            .collect();
        self.write_record(&Record::Frame { timestep, time_s: time, particles })?;
        self.frames += 1;
        Ok(())
    }

    pub fn write_splats(&mut self, records: &[TrackRecord]) -> io::Result<()> {
        self.write_record(&Record::Splats { particles: records })
    }

    /// Flush and close the output, completing the gzip stream.
    pub fn finish(self) -> io::Result<()> {
        self.into_bytes().map(drop)
    }

    /// Like [`TrajectoryWriter::finish`], returning what an in-memory writer
    /// collected. File writers return an empty buffer.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self.sink {
            Sink::Plain(mut w) => w.flush().map(|_| Vec::new()),
            Sink::Gzip(w) => w.finish()?.flush().map(|_| Vec::new()),
            Sink::Memory(bytes) => Ok(bytes),
        }
    }
}
