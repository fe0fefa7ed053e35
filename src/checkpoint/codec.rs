//! JSON persistence for [`Checkpoint`].
//!
//! A record looks like:
//!
//! ```json
//! {
//!   "format": "ferrite-ckpt",
//!   "version": 1,
//!   "architecture": { "input_size": 784, "output_size": 10,
//!                     "hidden_sizes": [512, 256, 128], "drop_p": 0.5 },
//!   "parameters": {
//!     "hidden.0.bias": { "shape": [512], "data": [0.0, ...] },
//!     ...
//!   }
//! }
//! ```
//!
//! Floats are printed in shortest round-trip form and parsed with
//! `serde_json`'s `float_roundtrip` feature, so values come back bit-exact.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::checkpoint::checkpoint::Checkpoint;
use crate::error::{CheckpointError, FormatError};
use crate::network::{ArchitectureDescriptor, ParameterSet};

pub const FORMAT_TAG: &str = "ferrite-ckpt";
pub const FORMAT_VERSION: u32 = 1;

/// Output options for [`Checkpoint::write_with`] and [`Checkpoint::save_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Indent the JSON document. Readable, but noticeably larger.
    pub pretty: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig { pretty: true }
    }
}

impl CodecConfig {
    pub fn compact() -> Self {
        CodecConfig { pretty: false }
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    format: &'a str,
    version: u32,
    architecture: &'a ArchitectureDescriptor,
    parameters: &'a ParameterSet,
}

#[derive(Deserialize)]
struct Record {
    format: String,
    version: u32,
    architecture: ArchitectureDescriptor,
    parameters: ParameterSet,
}

/// Splits serde_json failures into sink/source I/O errors and bad records.
fn classify(err: serde_json::Error) -> CheckpointError {
    match err.classify() {
        Category::Io => CheckpointError::Io(err.into()),
        Category::Syntax | Category::Data | Category::Eof => {
            CheckpointError::Format(FormatError::Json(err))
        }
    }
}

impl Checkpoint {
    /// Serializes the checkpoint as pretty-printed JSON.
    pub fn write<W: Write>(&self, sink: W) -> Result<(), CheckpointError> {
        self.write_with(sink, &CodecConfig::default())
    }

    /// Serializes the checkpoint into `sink`.
    ///
    /// Non-finite parameter values are rejected before anything is written.
    pub fn write_with<W: Write>(
        &self,
        mut sink: W,
        config: &CodecConfig,
    ) -> Result<(), CheckpointError> {
        for (key, tensor) in self.parameters().iter() {
            if let Some((index, value)) = tensor.first_non_finite() {
                return Err(CheckpointError::NonFiniteValue {
                    key: key.to_string(),
                    index,
                    value,
                });
            }
        }

        let record = RecordRef {
            format: FORMAT_TAG,
            version: FORMAT_VERSION,
            architecture: self.architecture(),
            parameters: self.parameters(),
        };

        if config.pretty {
            serde_json::to_writer_pretty(&mut sink, &record).map_err(classify)?;
        } else {
            serde_json::to_writer(&mut sink, &record).map_err(classify)?;
        }
        sink.flush()?;

        debug!(
            "wrote checkpoint: {} tensors, {} values",
            self.parameters().len(),
            self.parameters().value_count()
        );
        Ok(())
    }

    /// Parses and validates a record produced by [`Checkpoint::write`].
    ///
    /// The whole source is consumed; trailing non-whitespace is an error.
    pub fn read<R: Read>(source: R) -> Result<Checkpoint, CheckpointError> {
        let record: Record = serde_json::from_reader(source).map_err(classify)?;

        if record.format != FORMAT_TAG {
            return Err(FormatError::UnknownFormat(record.format).into());
        }
        if record.version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(record.version).into());
        }
        record
            .parameters
            .check_layout(&record.architecture.parameter_layout())
            .map_err(FormatError::Parameters)?;

        debug!(
            "read checkpoint: {} tensors, {} values",
            record.parameters.len(),
            record.parameters.value_count()
        );
        Ok(Checkpoint::from_checked_parts(record.architecture, record.parameters))
    }

    /// Writes the checkpoint to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        self.save_with(path, &CodecConfig::default())
    }

    /// Writes the checkpoint to `path`.
    ///
    /// The record goes to a sibling temporary file first and is renamed into
    /// place once fully written, so `path` never holds a partial record.
    pub fn save_with(
        &self,
        path: impl AsRef<Path>,
        config: &CodecConfig,
    ) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        let tmp = temporary_path(path);

        let result = self
            .write_file(&tmp, config)
            .and_then(|()| fs::rename(&tmp, path).map_err(CheckpointError::from));
        if result.is_err() {
            // Best effort; the original error is what matters.
            let _ = fs::remove_file(&tmp);
            return result;
        }

        info!("saved checkpoint to {}", path.display());
        Ok(())
    }

    fn write_file(&self, path: &Path, config: &CodecConfig) -> Result<(), CheckpointError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_with(&mut writer, config)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads a checkpoint from a file written by [`Checkpoint::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Checkpoint, CheckpointError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let checkpoint = Checkpoint::read(BufReader::new(file))?;
        info!("loaded checkpoint from {}", path.display());
        Ok(checkpoint)
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;
    use crate::network::Network;

    fn checkpoint(hidden: Vec<usize>) -> Checkpoint {
        let arch = ArchitectureDescriptor::new(12, 4, hidden)
            .unwrap()
            .with_drop_p(0.2)
            .unwrap();
        Checkpoint::capture(&Network::new(arch))
    }

    fn to_bytes(checkpoint: &Checkpoint, config: &CodecConfig) -> Vec<u8> {
        let mut buf = Vec::new();
        checkpoint.write_with(&mut buf, config).unwrap();
        buf
    }

    fn to_value(checkpoint: &Checkpoint) -> serde_json::Value {
        serde_json::from_slice(&to_bytes(checkpoint, &CodecConfig::compact())).unwrap()
    }

    fn read_value(value: &serde_json::Value) -> Result<Checkpoint, CheckpointError> {
        Checkpoint::read(serde_json::to_vec(value).unwrap().as_slice())
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn round_trip_is_exact() {
        for config in [CodecConfig::default(), CodecConfig::compact()] {
            let original = checkpoint(vec![9, 7]);
            let restored = Checkpoint::read(to_bytes(&original, &config).as_slice()).unwrap();
            assert_eq!(restored, original);
            assert_eq!(restored.architecture().drop_p(), 0.2);
        }
    }

    #[test]
    fn awkward_floats_survive() {
        let arch = ArchitectureDescriptor::new(3, 1, vec![]).unwrap();
        let mut params = ParameterSet::new();
        params.insert(
            "output.weight",
            Tensor::from_vec(vec![1, 3], vec![0.1 + 0.2, -0.0, f64::MIN_POSITIVE]).unwrap(),
        );
        params.insert("output.bias", Tensor::from_vec(vec![1], vec![1e300]).unwrap());
        let original = Checkpoint::new(arch, params).unwrap();

        let restored =
            Checkpoint::read(to_bytes(&original, &CodecConfig::compact()).as_slice()).unwrap();
        let weights = restored.parameters().get("output.weight").unwrap().as_slice();
        assert_eq!(weights[0].to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(weights[1].to_bits(), (-0.0f64).to_bits());
        assert_eq!(weights[2], f64::MIN_POSITIVE);
        assert_eq!(restored, original);
    }

    #[test]
    fn record_carries_tag_and_version() {
        let value = to_value(&checkpoint(vec![3]));
        assert_eq!(value["format"], FORMAT_TAG);
        assert_eq!(value["version"], FORMAT_VERSION);
        assert_eq!(value["architecture"]["hidden_sizes"], serde_json::json!([3]));
        assert_eq!(
            value["parameters"]["hidden.0.weight"]["shape"],
            serde_json::json!([3, 12])
        );
    }

    #[test]
    fn truncated_record_is_a_format_error() {
        let bytes = to_bytes(&checkpoint(vec![5]), &CodecConfig::compact());
        for cut in [0, 1, bytes.len() / 2, bytes.len() - 1] {
            let err = Checkpoint::read(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, CheckpointError::Format(FormatError::Json(_))),
                "cut at {cut}: {err:?}"
            );
        }
    }

    #[test]
    fn missing_parameter_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![5]));
        value["parameters"].as_object_mut().unwrap().remove("output.bias");

        match read_value(&value).unwrap_err() {
            CheckpointError::Format(FormatError::Parameters(err)) => {
                assert_eq!(err.keys().collect::<Vec<_>>(), ["output.bias"]);
            }
            other => panic!("expected missing parameter, got {other:?}"),
        }
    }

    #[test]
    fn missing_architecture_field_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![5]));
        value["architecture"].as_object_mut().unwrap().remove("input_size");

        let err = read_value(&value).unwrap_err();
        assert!(matches!(err, CheckpointError::Format(FormatError::Json(_))));
        assert!(err.to_string().contains("input_size"));
    }

    #[test]
    fn invalid_architecture_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![]));
        value["architecture"]["output_size"] = serde_json::json!(0);

        let err = read_value(&value).unwrap_err();
        assert!(matches!(err, CheckpointError::Format(FormatError::Json(_))));
    }

    #[test]
    fn wrong_field_type_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![]));
        value["architecture"]["hidden_sizes"] = serde_json::json!("512,256");

        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::Json(_))
        ));
    }

    #[test]
    fn tensor_length_must_match_shape() {
        let mut value = to_value(&checkpoint(vec![]));
        value["parameters"]["output.bias"]["data"]
            .as_array_mut()
            .unwrap()
            .pop();

        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::Json(_))
        ));
    }

    #[test]
    fn overflowing_sizes_are_a_format_error() {
        let record = br#"{
            "format": "ferrite-ckpt",
            "version": 1,
            "architecture": {"input_size": 9223372036854775808, "output_size": 2, "hidden_sizes": []},
            "parameters": {
                "output.weight": {"shape": [2, 9223372036854775808], "data": []},
                "output.bias": {"shape": [2], "data": [0.0, 0.0]}
            }
        }"#;

        assert!(matches!(
            Checkpoint::read(&record[..]).unwrap_err(),
            CheckpointError::Format(FormatError::Json(_))
        ));
    }

    #[test]
    fn overflowing_tensor_shape_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![]));
        value["parameters"]["output.weight"] =
            serde_json::json!({"shape": [2, 9223372036854775808u64], "data": []});

        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::Json(_))
        ));
    }

    #[test]
    fn parameter_shape_must_match_architecture() {
        let mut value = to_value(&checkpoint(vec![]));
        value["architecture"]["input_size"] = serde_json::json!(6);

        match read_value(&value).unwrap_err() {
            CheckpointError::Format(FormatError::Parameters(err)) => {
                assert_eq!(err.keys().collect::<Vec<_>>(), ["output.weight"]);
            }
            other => panic!("expected shape disagreement, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_parameter_is_a_format_error() {
        let mut value = to_value(&checkpoint(vec![]));
        value["parameters"]["hidden.0.bias"] = serde_json::json!({"shape": [1], "data": [0.0]});

        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::Parameters(_))
        ));
    }

    #[test]
    fn rejects_foreign_tag_and_future_version() {
        let mut value = to_value(&checkpoint(vec![]));
        value["format"] = serde_json::json!("torch-pickle");
        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::UnknownFormat(tag)) if tag == "torch-pickle"
        ));

        let mut value = to_value(&checkpoint(vec![]));
        value["version"] = serde_json::json!(2);
        assert!(matches!(
            read_value(&value).unwrap_err(),
            CheckpointError::Format(FormatError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn non_finite_values_are_rejected_before_writing() {
        let (arch, mut params) = checkpoint(vec![2]).into_parts();
        params.get_mut("hidden.0.bias").unwrap().as_mut_slice()[1] = f64::NAN;
        let poisoned = Checkpoint::new(arch, params).unwrap();

        let mut buf = Vec::new();
        let err = poisoned.write(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::NonFiniteValue { ref key, index: 1, .. } if key == "hidden.0.bias"
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn sink_failure_is_an_io_error() {
        let err = checkpoint(vec![2]).write(BrokenSink).unwrap_err();
        match err {
            CheckpointError::Io(e) => assert_eq!(e.to_string(), "disk full"),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        let original = checkpoint(vec![6, 5]);

        original.save(&path).unwrap();
        assert!(!temporary_path(&path).exists());
        assert_eq!(Checkpoint::load(&path).unwrap(), original);
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");

        checkpoint(vec![6]).save(&path).unwrap();
        let second = checkpoint(vec![2, 2]);
        second.save_with(&path, &CodecConfig::compact()).unwrap();

        assert_eq!(Checkpoint::load(&path).unwrap(), second);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Checkpoint::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CheckpointError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("classifier.json");

        let err = checkpoint(vec![]).save(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::Io(_)));
        assert!(!path.exists());
    }
}
