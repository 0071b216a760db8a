use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use rand::Rng;

use crate::error::BenchError;

/// The immutable set of query parameters workers draw from.
///
/// Every non-blank line of the source file, trimmed, becomes one parameter. The
/// corpus is loaded once before any worker starts and is only ever read after that,
/// so workers share it behind an `Arc` without any locking.
#[derive(Debug, Clone)]
pub struct ParameterCorpus {
    params: Vec<String>,
}

impl ParameterCorpus {
    /// Load a newline-delimited parameter file.
    ///
    /// An unreadable or empty file is a setup error: the run must not start with
    /// nothing to send.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let io_err = |source| BenchError::Corpus {
            path: path.to_path_buf(),
            source,
        };

        let lines = BufReader::new(File::open(path).map_err(io_err)?)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        let corpus =
            Self::from_lines(lines).map_err(|_| BenchError::EmptyCorpus(path.to_path_buf()))?;
        tracing::info!("Loaded {} parameters from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    /// Build a corpus from in-memory lines, applying the same trimming rules as
    /// [`ParameterCorpus::load`].
    pub fn from_lines<I, S>(lines: I) -> Result<Self, BenchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params: Vec<String> = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if params.is_empty() {
            return Err(BenchError::NoParameters);
        }
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// Pick a parameter uniformly at random.
    pub fn pick<'a>(&'a self, rng: &mut impl Rng) -> &'a str {
        &self.params[rng.gen_range(0..self.params.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::io::Write;

    #[test]
    fn load_trims_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  [0.1,0.2]  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "[0.3,0.4]").unwrap();

        let corpus = ParameterCorpus::load(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0), Some("[0.1,0.2]"));
        assert_eq!(corpus.get(1), Some("[0.3,0.4]"));
    }

    #[test]
    fn missing_file_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParameterCorpus::load(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, BenchError::Corpus { .. }));
    }

    #[test]
    fn blank_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n  \n\t").unwrap();
        let err = ParameterCorpus::load(file.path()).unwrap_err();
        assert!(matches!(err, BenchError::EmptyCorpus(_)));
    }

    #[test]
    fn pick_stays_in_bounds() {
        let corpus = ParameterCorpus::from_lines(["a", "b", "c"]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let p = corpus.pick(&mut rng);
            assert!(["a", "b", "c"].contains(&p));
        }
    }

    #[test]
    fn from_lines_rejects_all_blank() {
        assert!(matches!(
            ParameterCorpus::from_lines(["", "  "]),
            Err(BenchError::NoParameters)
        ));
    }
}
