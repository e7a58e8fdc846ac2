use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use log::{debug, info};

use super::{Dataset, idx};
use crate::Result;

/// Side length of an MNIST digit.
pub const SIDE: usize = 28;

/// Amount of digit classes.
pub const CLASSES: usize = 10;

/// The two partitions of the MNIST database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// The names of the uncompressed images and labels files of this split.
    pub fn files(self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

/// Loads an MNIST split from the IDX files inside `dir`. Each file is read as is or, when only
/// the gzipped `<name>.gz` of the official distribution is there, decompressed on the fly.
///
/// # Returns
/// The dataset or an error if a file is missing, malformed, or images and labels don't pair up.
pub fn load(dir: &Path, split: Split) -> Result<Dataset> {
    let (images_file, labels_file) = split.files();

    let images = idx::parse_images(&read(&dir.join(images_file))?)?;
    let labels = idx::parse_labels(&read(&dir.join(labels_file))?)?;

    let dataset = Dataset::new(images, labels)?;
    info!(
        "loaded {} {split:?} samples from {}",
        dataset.len(),
        dir.display()
    );

    Ok(dataset)
}

fn read(path: &Path) -> io::Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let gz_path = gz_path(path);
            if !gz_path.exists() {
                return Err(with_path(e, path));
            }

            debug!("decompressing {}", gz_path.display());
            let compressed = fs::read(&gz_path).map_err(|e| with_path(e, &gz_path))?;

            let mut bytes = Vec::new();
            GzDecoder::new(compressed.as_slice())
                .read_to_end(&mut bytes)
                .map_err(|e| with_path(e, &gz_path))?;

            Ok(bytes)
        }
        Err(e) => Err(with_path(e, path)),
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    name.into()
}

fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MlErr,
        dataset::idx::tests::{encode_images, encode_labels},
    };

    #[test]
    fn loads_a_split_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (images_file, labels_file) = Split::Test.files();
        let pixels: Vec<u8> = (0..2 * 28 * 28).map(|i| (i % 256) as u8).collect();
        fs::write(dir.path().join(images_file), encode_images(2, 28, 28, &pixels)).unwrap();
        fs::write(dir.path().join(labels_file), encode_labels(&[3, 9])).unwrap();

        let dataset = load(dir.path(), Split::Test).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.images().dim(), (2, 1, SIDE, SIDE));
        assert_eq!(dataset.labels(), &[3, 9]);
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        use std::io::Write;

        use flate2::{Compression, write::GzEncoder};

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn falls_back_to_gzipped_files() {
        let dir = tempfile::tempdir().unwrap();
        let (images_file, labels_file) = Split::Train.files();
        let pixels: Vec<u8> = (0..3 * 28 * 28).map(|i| (i % 200) as u8).collect();
        fs::write(
            dir.path().join(format!("{images_file}.gz")),
            gzip(&encode_images(3, 28, 28, &pixels)),
        )
        .unwrap();
        // mixing plain and gzipped files is fine.
        fs::write(dir.path().join(labels_file), encode_labels(&[0, 5, 9])).unwrap();

        let dataset = load(dir.path(), Split::Train).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.labels(), &[0, 5, 9]);
        assert!((dataset.images()[[2, 0, 0, 1]] - 169. / 255.).abs() < 1e-6);
        assert!((dataset.images()[[0, 0, 7, 3]] - 199. / 255.).abs() < 1e-6);
    }

    #[test]
    fn corrupt_gzip_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (images_file, _) = Split::Test.files();
        fs::write(dir.path().join(format!("{images_file}.gz")), b"not gzip").unwrap();

        let err = load(dir.path(), Split::Test).unwrap_err();

        assert!(matches!(err, MlErr::Io(_)));
        assert!(err.to_string().contains("t10k-images-idx3-ubyte.gz"));
    }

    #[test]
    fn missing_files_name_the_path() {
        let dir = tempfile::tempdir().unwrap();

        let err = load(dir.path(), Split::Train).unwrap_err();

        assert!(matches!(err, MlErr::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert!(err.to_string().contains("train-images-idx3-ubyte"));
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (images_file, labels_file) = Split::Train.files();
        fs::write(dir.path().join(images_file), encode_images(1, 1, 1, &[0])).unwrap();
        fs::write(dir.path().join(labels_file), encode_labels(&[1, 2])).unwrap();

        assert!(matches!(
            load(dir.path(), Split::Train),
            Err(MlErr::SizeMismatch { .. })
        ));
    }
}
