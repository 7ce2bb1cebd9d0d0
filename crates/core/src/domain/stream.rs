//! Header passthrough and block-wise filtering of a PCM body
//!
//! The processor copies the 44-byte header verbatim, then reads the body in
//! fixed-size blocks of i16 LE samples, filters each block in place and
//! writes it out, until a read yields no whole sample.

use crate::domain::audio::{
    AudioError, DeclaredFormat, Result, WavHeader, BYTES_PER_SAMPLE, WAV_HEADER_SIZE,
};
use crate::domain::dsp::BlockFilter;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Default number of samples per I/O block
pub const DEFAULT_BLOCK_SIZE: usize = 1000;

/// Counters for a processed stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub blocks: u64,
    pub samples: u64,
}

/// Open the input file for reading
pub fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| AudioError::FileOpen {
            role: "input",
            path: path.to_path_buf(),
            source,
        })
}

/// Create (or truncate) the output file
pub fn open_output(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| AudioError::FileOpen {
            role: "output",
            path: path.to_path_buf(),
            source,
        })
}

/// Read the leading 44 bytes of the stream
pub fn read_header<R: Read>(reader: &mut R) -> Result<WavHeader> {
    let mut bytes = [0u8; WAV_HEADER_SIZE];
    reader.read_exact(&mut bytes).map_err(AudioError::HeaderRead)?;
    Ok(WavHeader::new(bytes))
}

/// Write the header back out unchanged
pub fn write_header<W: Write>(writer: &mut W, header: &WavHeader) -> Result<()> {
    writer
        .write_all(header.as_bytes())
        .map_err(AudioError::HeaderWrite)
}

/// Fill `buf` from `reader`, stopping early only at end of stream
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Drives a [`BlockFilter`] over a WAV byte stream
///
/// The sample and byte buffers are allocated once and reused per block.
pub struct StreamProcessor {
    filter: Box<dyn BlockFilter>,
    samples: Vec<i16>,
    bytes: Vec<u8>,
    expected: Option<DeclaredFormat>,
}

impl StreamProcessor {
    /// Create a processor reading `block_size` samples per block
    ///
    /// # Errors
    /// Returns [`AudioError::InvalidConfiguration`] if `block_size` is zero.
    pub fn new(filter: Box<dyn BlockFilter>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "block size must be at least one sample".to_string(),
            ));
        }

        Ok(Self {
            filter,
            samples: vec![0; block_size],
            bytes: vec![0; block_size * BYTES_PER_SAMPLE],
            expected: None,
        })
    }

    /// Warn when the header declares a different channel count or rate
    ///
    /// The header is still copied verbatim and the body still filtered.
    pub fn with_expected_format(mut self, channels: u16, sample_rate: u32) -> Self {
        self.expected = Some(DeclaredFormat {
            channels,
            sample_rate,
        });
        self
    }

    pub fn block_size(&self) -> usize {
        self.samples.len()
    }

    /// Copy the header, then filter the body
    pub fn run<R: Read, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<StreamStats> {
        let header = read_header(reader)?;
        self.check_header(&header);
        write_header(writer, &header)?;

        let stats = self.process_body(reader, writer)?;
        writer.flush().map_err(AudioError::BodyWrite)?;
        Ok(stats)
    }

    /// Filter `input` into `output`
    #[instrument(skip(self), fields(layout = self.filter.name()))]
    pub fn run_files(&mut self, input: &Path, output: &Path) -> Result<StreamStats> {
        let mut reader = open_input(input)?;
        let mut writer = open_output(output)?;

        let stats = self.run(&mut reader, &mut writer)?;
        info!(
            blocks = stats.blocks,
            samples = stats.samples,
            "Stream filtered"
        );
        Ok(stats)
    }

    /// Filter the sample body block by block
    ///
    /// A trailing odd byte at the end of the body is not a whole sample and
    /// is dropped.
    pub fn process_body<R: Read, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<StreamStats> {
        let mut stats = StreamStats::default();

        loop {
            let read = read_block(reader, &mut self.bytes).map_err(AudioError::BodyRead)?;
            let count = read / BYTES_PER_SAMPLE;
            if read % BYTES_PER_SAMPLE != 0 {
                debug!("Dropping trailing partial sample");
            }
            if count == 0 {
                break;
            }

            let block = &mut self.samples[..count];
            for (sample, raw) in block.iter_mut().zip(self.bytes.chunks_exact(BYTES_PER_SAMPLE)) {
                *sample = i16::from_le_bytes([raw[0], raw[1]]);
            }

            self.filter.process(block);

            for (raw, sample) in self.bytes.chunks_exact_mut(BYTES_PER_SAMPLE).zip(block.iter()) {
                raw.copy_from_slice(&sample.to_le_bytes());
            }
            writer
                .write_all(&self.bytes[..count * BYTES_PER_SAMPLE])
                .map_err(AudioError::BodyWrite)?;

            stats.blocks += 1;
            stats.samples += count as u64;

            // A short block means the reader hit end of stream
            if count < self.samples.len() {
                break;
            }
        }

        debug!(blocks = stats.blocks, samples = stats.samples, "Body processed");
        Ok(stats)
    }

    fn check_header(&self, header: &WavHeader) {
        let Some(expected) = self.expected else {
            return;
        };

        match header.declared_format() {
            Some(declared) if declared != expected => warn!(
                header_channels = declared.channels,
                header_sample_rate = declared.sample_rate,
                channels = expected.channels,
                sample_rate = expected.sample_rate,
                "Header format differs from configuration, filtering with configured values"
            ),
            Some(_) => debug!("Header format matches configuration"),
            None => debug!("Header is not a canonical PCM header, copying it verbatim"),
        }
    }
}
