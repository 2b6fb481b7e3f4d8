//! Persisted forms of a signal
//!
//! Two on-demand formats:
//! - a flat numeric array file (NumPy `.npy` v1.0, little-endian `f64`, C order)
//! - delimited text with an `index` column followed by one value column per channel

use crate::error::{EngineError, EngineResult};
use crate::signal::{load, Signal};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const NPY_ALIGNMENT: usize = 64;

fn format_error(reason: impl Into<String>) -> EngineError {
    EngineError::Format {
        reason: reason.into(),
    }
}

/// Write the signal as a `.npy` array to `path`
pub fn write_npy(signal: &Signal, path: impl AsRef<Path>) -> EngineResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_npy_to(signal, &mut writer)?;
    writer.flush()?;
    debug!(path = %path.display(), channels = signal.channel_count(), "wrote npy signal");
    Ok(())
}

/// Shape is `(samples,)` for one channel and `(channels, samples)` otherwise
pub fn write_npy_to<W: Write>(signal: &Signal, writer: &mut W) -> EngineResult<()> {
    let shape = if signal.channel_count() == 1 {
        format!("({},)", signal.samples_per_channel())
    } else {
        format!("({}, {})", signal.channel_count(), signal.samples_per_channel())
    };
    let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}", shape);

    // magic + version + u16 length, then the header padded so data starts aligned
    let preamble = NPY_MAGIC.len() + 2 + 2;
    let unpadded = preamble + header.len() + 1;
    let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len()).map_err(|_| format_error("npy header too long"))?;

    writer.write_all(NPY_MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in signal.data().iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Read a `.npy` array written by [`write_npy`] or NumPy itself
pub fn read_npy(path: impl AsRef<Path>, sampling_rate: f64) -> EngineResult<Signal> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    read_npy_from(&mut reader, sampling_rate)
}

pub fn read_npy_from<R: Read>(reader: &mut R, sampling_rate: f64) -> EngineResult<Signal> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(format_error("missing npy magic"));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        major => return Err(format_error(format!("unsupported npy version {}", major))),
    };

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header).map_err(|_| format_error("npy header is not utf-8"))?;
    let header = NpyHeader::parse(&header)?;

    let width = header.dtype.width();
    let bytes = header
        .shape
        .iter()
        .try_fold(width, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| crate::malformed_input!("npy shape {:?} overflows the addressable size", header.shape))?;
    // Grow with the data actually present instead of trusting the header
    let mut raw = Vec::new();
    reader.take(bytes as u64).read_to_end(&mut raw)?;
    if raw.len() != bytes {
        return Err(format_error(format!("npy payload truncated: {} of {} bytes", raw.len(), bytes)));
    }
    let values: Vec<f64> = raw.chunks_exact(width).map(|chunk| header.dtype.decode(chunk)).collect();

    let (rows, cols) = match header.shape.as_slice() {
        [n] => (1, *n),
        [r, c] => (*r, *c),
        other => return Err(format_error(format!("rank {} array, expected 1 or 2", other.len()))),
    };

    let data = if header.fortran_order {
        Array2::from_shape_vec((cols, rows), values)
            .map_err(|e| format_error(e.to_string()))?
            .reversed_axes()
            .as_standard_layout()
            .into_owned()
    } else {
        Array2::from_shape_vec((rows, cols), values).map_err(|e| format_error(e.to_string()))?
    };

    load(data, sampling_rate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NpyDtype {
    F8,
    F4,
}

impl NpyDtype {
    fn width(self) -> usize {
        match self {
            NpyDtype::F8 => 8,
            NpyDtype::F4 => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            NpyDtype::F8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                f64::from_le_bytes(buf)
            }
            NpyDtype::F4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                f32::from_le_bytes(buf) as f64
            }
        }
    }
}

#[derive(Debug)]
struct NpyHeader {
    dtype: NpyDtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl NpyHeader {
    fn parse(header: &str) -> EngineResult<Self> {
        let descr = Self::value_after(header, "'descr':")?;
        let descr = descr.trim_start().trim_start_matches('\'');
        let dtype = if descr.starts_with("<f8") {
            NpyDtype::F8
        } else if descr.starts_with("<f4") {
            NpyDtype::F4
        } else {
            return Err(format_error(format!("unsupported npy dtype {}", descr)));
        };

        let fortran_order = Self::value_after(header, "'fortran_order':")?
            .trim_start()
            .starts_with("True");

        let shape_text = Self::value_after(header, "'shape':")?;
        let open = shape_text.find('(').ok_or_else(|| format_error("npy shape missing '('"))?;
        let close = shape_text.find(')').ok_or_else(|| format_error("npy shape missing ')'"))?;
        let shape = shape_text[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>().map_err(|_| format_error(format!("bad npy dimension '{}'", s))))
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self {
            dtype,
            fortran_order,
            shape,
        })
    }

    fn value_after<'a>(header: &'a str, key: &str) -> EngineResult<&'a str> {
        header
            .find(key)
            .map(|pos| &header[pos + key.len()..])
            .ok_or_else(|| format_error(format!("npy header missing {}", key)))
    }
}

/// Write `index,value` (one channel) or `index,ch0,ch1,...` rows to `path`
pub fn write_csv(signal: &Signal, path: impl AsRef<Path>) -> EngineResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_csv_to(signal, file)?;
    debug!(path = %path.display(), samples = signal.samples_per_channel(), "wrote csv signal");
    Ok(())
}

pub fn write_csv_to<W: Write>(signal: &Signal, writer: W) -> EngineResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["index".to_string()];
    if signal.channel_count() == 1 {
        header.push("value".to_string());
    } else {
        header.extend((0..signal.channel_count()).map(|ch| format!("ch{}", ch)));
    }
    csv_writer.write_record(&header)?;

    let data = signal.data();
    for sample in 0..signal.samples_per_channel() {
        let mut record = Vec::with_capacity(signal.channel_count() + 1);
        record.push(sample.to_string());
        record.extend(data.column(sample).iter().map(|v| v.to_string()));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read delimited text; a leading `index` column is skipped, every other column is a channel
pub fn read_csv(path: impl AsRef<Path>, sampling_rate: f64) -> EngineResult<Signal> {
    let file = File::open(path.as_ref())?;
    read_csv_from(file, sampling_rate)
}

pub fn read_csv_from<R: Read>(reader: R, sampling_rate: f64) -> EngineResult<Signal> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let skip = usize::from(headers.get(0).map(|h| h.trim() == "index").unwrap_or(false));
    let channel_count = headers.len().saturating_sub(skip);
    if channel_count == 0 {
        return Err(format_error("csv has no value columns"));
    }

    let mut channels: Vec<Vec<f64>> = vec![Vec::new(); channel_count];
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        for (ch, field) in record.iter().skip(skip).enumerate().take(channel_count) {
            let value = field
                .trim()
                .parse::<f64>()
                .map_err(|_| format_error(format!("row {}: '{}' is not a number", row + 1, field)))?;
            channels[ch].push(value);
        }
    }

    load(channels, sampling_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_channel() -> Signal {
        load(array![[0.5, -1.25, 3.0], [1e-6, 2.0, -7.5]], 3.0).unwrap()
    }

    #[test]
    fn test_npy_header_is_aligned() {
        let mut bytes = Vec::new();
        write_npy_to(&two_channel(), &mut bytes).unwrap();

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % NPY_ALIGNMENT, 0);
        assert_eq!(bytes.len(), 10 + header_len + 6 * 8);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (2, 3)"));
        assert!(header.ends_with('\n'));
    }

    #[test]
    fn test_npy_file_reads_back_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.npy");
        let signal = two_channel();

        write_npy(&signal, &path).unwrap();
        let restored = read_npy(&path, 3.0).unwrap();
        assert!(restored.same_samples(&signal));
    }

    #[test]
    fn test_single_channel_npy_is_one_dimensional() {
        let mut bytes = Vec::new();
        write_npy_to(&load(vec![1.0, 2.0], 2.0).unwrap(), &mut bytes).unwrap();
        let header = String::from_utf8_lossy(&bytes[10..]);
        assert!(header.contains("'shape': (2,)"));
    }

    #[test]
    fn test_npy_rejects_bad_magic() {
        let bytes = b"NOTNPY....".to_vec();
        let result = read_npy_from(&mut bytes.as_slice(), 1.0);
        assert!(matches!(result, Err(EngineError::Format { .. })));
    }

    fn npy_with_header(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_npy_oversized_shape_rejected() {
        // 2^61 elements of 8 bytes overflow a 64-bit size
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (2305843009213693952,), }\n";
        let bytes = npy_with_header(header, &[0u8; 16]);
        let result = read_npy_from(&mut bytes.as_slice(), 1.0);
        assert!(matches!(result, Err(EngineError::MalformedInput { .. })));

        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (4294967296, 4294967296), }\n";
        let bytes = npy_with_header(header, &[]);
        let result = read_npy_from(&mut bytes.as_slice(), 1.0);
        assert!(matches!(result, Err(EngineError::MalformedInput { .. })));
    }

    #[test]
    fn test_npy_truncated_payload_rejected() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (4,), }\n";
        let bytes = npy_with_header(header, &[0u8; 24]);
        let result = read_npy_from(&mut bytes.as_slice(), 1.0);
        assert!(matches!(result, Err(EngineError::Format { .. })));
    }

    #[test]
    fn test_fortran_order_header() {
        let header = "{'descr': '<f4', 'fortran_order': True, 'shape': (3, 2), }";
        let parsed = NpyHeader::parse(header).unwrap();
        assert_eq!(parsed.dtype, NpyDtype::F4);
        assert!(parsed.fortran_order);
        assert_eq!(parsed.shape, vec![3, 2]);
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_csv_to(&load(vec![1.5, -2.0], 2.0).unwrap(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "index,value\n0,1.5\n1,-2\n");

        let mut out = Vec::new();
        write_csv_to(&two_channel(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("index,ch0,ch1\n0,0.5,0.000001\n"));
    }

    #[test]
    fn test_csv_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.csv");
        let signal = two_channel();

        write_csv(&signal, &path).unwrap();
        let restored = read_csv(&path, 3.0).unwrap();
        assert!(restored.same_samples(&signal));
    }

    #[test]
    fn test_csv_without_index_uses_all_columns() {
        let text = "fp1,fp2\n1.0,2.0\n3.0,4.0\n";
        let signal = read_csv_from(text.as_bytes(), 1.0).unwrap();
        assert_eq!(signal.channel_count(), 2);
        assert_eq!(signal.channel(1).unwrap()[1], 4.0);

        let bad = "value\nabc\n";
        assert!(matches!(read_csv_from(bad.as_bytes(), 1.0), Err(EngineError::Format { .. })));
    }
}
