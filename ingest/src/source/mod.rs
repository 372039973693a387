//! Byte-stream sources for archive files on disk.

use bzip2::read::{BzDecoder, MultiBzDecoder};
use libflate::gzip;
use nexradcore::prelude::{ByteSource, SourceError};
use nexradcore::wire::{VolumeTitle, VOLUME_TITLE_BYTES};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
/// Volume title, LDM control word, then the bzip2 magic of the first record.
const SNIFF_BYTES: usize = VOLUME_TITLE_BYTES + 4 + 3;

/// Compression detected from the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Gzip,
    /// The whole file is one or more bzip2 streams.
    Bzip2,
    /// Archive II layout: an uncompressed volume title followed by
    /// bzip2-compressed LDM records.
    LdmRecords,
}

impl Encoding {
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(BZIP2_MAGIC) {
            Self::Bzip2
        } else if VolumeTitle::detect(head).is_some()
            && head.len() >= SNIFF_BYTES
            && head[VOLUME_TITLE_BYTES + 4..].starts_with(BZIP2_MAGIC)
        {
            Self::LdmRecords
        } else {
            Self::Raw
        }
    }
}

/// Reads a whole file, decompressing gzip, bzip2 or LDM records on the fly.
///
/// Decompression errors surface from `read` instead of ending the stream
/// early.
pub struct FileSource {
    reader: Box<dyn Read>,
    encoding: Encoding,
    at_end: bool,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let mut file = BufReader::new(File::open(path.as_ref())?);
        let mut head = [0u8; SNIFF_BYTES];
        let n = read_up_to(&mut file, &mut head)?;
        let encoding = Encoding::sniff(&head[..n]);
        let prefix = Cursor::new(head[..n].to_vec());
        let mut chained = prefix.chain(file);
        let reader: Box<dyn Read> = match encoding {
            Encoding::Raw => Box::new(chained),
            Encoding::Gzip => Box::new(
                gzip::Decoder::new(chained)
                    .map_err(|err| SourceError::Decompress(err.to_string()))?,
            ),
            Encoding::Bzip2 => Box::new(MultiBzDecoder::new(chained)),
            Encoding::LdmRecords => {
                let mut title = vec![0u8; VOLUME_TITLE_BYTES];
                chained.read_exact(&mut title)?;
                Box::new(Cursor::new(title).chain(LdmRecords::new(chained)))
            }
        };
        Ok(Self {
            reader,
            encoding,
            at_end: false,
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Inflates LDM records one at a time. Each record is a big-endian control
/// word holding the compressed size (negative on the last record of a
/// volume) followed by a bzip2 stream.
struct LdmRecords<R> {
    inner: R,
    record: Cursor<Vec<u8>>,
}

impl<R: Read> LdmRecords<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            record: Cursor::new(Vec::new()),
        }
    }

    /// Loads the next record; false at a clean end of file.
    fn next_record(&mut self) -> io::Result<bool> {
        let mut word = [0u8; 4];
        match read_up_to(&mut self.inner, &mut word)? {
            0 => return Ok(false),
            4 => {}
            n => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("LDM control word cut short after {n} bytes"),
                ))
            }
        }
        let size = i32::from_be_bytes(word).unsigned_abs() as usize;
        let mut compressed = vec![0u8; size];
        self.inner.read_exact(&mut compressed)?;
        let mut inflated = Vec::new();
        if size > 0 {
            BzDecoder::new(compressed.as_slice()).read_to_end(&mut inflated)?;
        }
        self.record = Cursor::new(inflated);
        Ok(true)
    }
}

impl<R: Read> Read for LdmRecords<R> {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.record.read(buffer)?;
            if n > 0 || buffer.is_empty() {
                return Ok(n);
            }
            if !self.next_record()? {
                return Ok(0);
            }
        }
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SourceError> {
        if self.at_end || buffer.is_empty() {
            return Ok(0);
        }
        let n = match self.encoding {
            Encoding::Raw => self.reader.read(buffer)?,
            Encoding::Gzip | Encoding::Bzip2 | Encoding::LdmRecords => self
                .reader
                .read(buffer)
                .map_err(|err| SourceError::Decompress(err.to_string()))?,
        };
        if n == 0 {
            self.at_end = true;
        }
        Ok(n)
    }

    fn is_at_end(&self) -> bool {
        self.at_end
    }
}
