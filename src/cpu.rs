//! CPU load sampling from the kernel's cumulative tick counters

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Source of the two monotonic counters: ticks spent doing work and ticks
/// spent idle, cumulative since boot.
pub trait TickSource {
    fn read(&mut self) -> io::Result<(u64, u64)>;
}

/// The aggregate `cpu` line of `/proc/stat`.
///
/// Busy = user + nice + system; idle = idle + iowait. The file is kept open
/// and rewound between samples.
pub struct ProcStat {
    file: File,
}

impl ProcStat {
    pub fn new() -> io::Result<Self> {
        Self::at("/proc/stat")
    }

    pub fn at<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self { file: File::open(path)? })
    }
}

impl TickSource for ProcStat {
    fn read(&mut self) -> io::Result<(u64, u64)> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut text = String::new();
        self.file.read_to_string(&mut text)?;

        let line = text.lines().next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "first line of /proc/stat not recognized",
            ));
        }

        let mut next = || -> io::Result<u64> {
            fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "short cpu line"))
        };
        let user = next()?;
        let nice = next()?;
        let system = next()?;
        let idle = next()?;
        let iowait = next()?;

        Ok((user + nice + system, idle + iowait))
    }
}

/// Derives a busy fraction from the delta between consecutive counter reads.
pub struct CpuSampler<S> {
    source: S,
    previous: Option<(u64, u64)>,
}

impl<S: TickSource> CpuSampler<S> {
    pub fn new(source: S) -> Self {
        Self { source, previous: None }
    }

    /// Busy fraction in [0.0, 1.0] over the interval since the last call.
    ///
    /// The first call only establishes the baseline and returns `None`, as
    /// does an interval in which no ticks elapsed at all.
    pub fn sample(&mut self) -> io::Result<Option<f64>> {
        let (busy, idle) = self.source.read()?;
        let fraction = self.previous.and_then(|(prev_busy, prev_idle)| {
            let delta_busy = busy.saturating_sub(prev_busy);
            let delta_idle = idle.saturating_sub(prev_idle);
            let total = delta_busy + delta_idle;
            if total == 0 {
                None
            } else {
                Some((delta_busy as f64 / total as f64).clamp(0.0, 1.0))
            }
        });
        self.previous = Some((busy, idle));
        Ok(fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<(u64, u64)>);

    impl TickSource for Scripted {
        fn read(&mut self) -> io::Result<(u64, u64)> {
            if self.0.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"));
            }
            Ok(self.0.remove(0))
        }
    }

    #[test]
    fn test_first_sample_is_warmup() {
        let mut sampler = CpuSampler::new(Scripted(vec![(0, 0)]));
        assert_eq!(sampler.sample().unwrap(), None);
    }

    #[test]
    fn test_delta_fraction() {
        let mut sampler = CpuSampler::new(Scripted(vec![(0, 0), (10, 90)]));
        assert_eq!(sampler.sample().unwrap(), None);
        assert_eq!(sampler.sample().unwrap(), Some(0.10));
    }

    #[test]
    fn test_fraction_tracks_consecutive_intervals() {
        let mut sampler = CpuSampler::new(Scripted(vec![(0, 0), (50, 50), (150, 50)]));
        sampler.sample().unwrap();
        assert_eq!(sampler.sample().unwrap(), Some(0.5));
        // Second interval: 100 busy, 0 idle.
        assert_eq!(sampler.sample().unwrap(), Some(1.0));
    }

    #[test]
    fn test_zero_total_delta() {
        let mut sampler = CpuSampler::new(Scripted(vec![(5, 5), (5, 5)]));
        sampler.sample().unwrap();
        assert_eq!(sampler.sample().unwrap(), None);
    }

    #[test]
    fn test_source_errors_propagate() {
        let mut sampler = CpuSampler::new(Scripted(vec![]));
        assert!(sampler.sample().is_err());
    }

    #[test]
    fn test_proc_stat_parse() {
        use std::io::Write;

        let path = std::env::temp_dir().join(format!("fadestick-procstat-{}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        writeln!(f, "cpu  100 20 30 400 50 0 7 0 0 0").unwrap();
        writeln!(f, "cpu0 100 20 30 400 50 0 7 0 0 0").unwrap();

        let mut source = ProcStat::at(&path).unwrap();
        assert_eq!(source.read().unwrap(), (150, 450));
        // A second read rewinds and sees the same totals.
        assert_eq!(source.read().unwrap(), (150, 450));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_proc_stat_rejects_foreign_file() {
        use std::io::Write;

        let path = std::env::temp_dir().join(format!("fadestick-notstat-{}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        writeln!(f, "intr 12345").unwrap();

        let mut source = ProcStat::at(&path).unwrap();
        assert!(source.read().is_err());
        let _ = std::fs::remove_file(&path);
    }
}
