use std::{fs, io, sync::Arc, thread};

use rotating_logger::{ErrorDetail, LoggerConfig, RotatingLogger, RotationPeriod};
use time::macros::datetime;

const THREADS: usize = 16;
const RECORDS_PER_THREAD: usize = 50;

fn shared_logger(root: &std::path::Path) -> Arc<RotatingLogger> {
    let config = LoggerConfig::new(RotationPeriod::Weekly, "load");
    let logger = RotatingLogger::builder(root, config)
        .clock(|| datetime!(2024-03-15 12:00:00 UTC))
        .console(io::sink)
        .build()
        .unwrap();
    Arc::new(logger)
}

#[test]
fn test_concurrent_records_are_not_interleaved() {
    let root = tempfile::tempdir().unwrap();
    let logger = shared_logger(root.path());

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for sequence in 0..RECORDS_PER_THREAD {
                    let detail =
                        ErrorDetail::new(format!("boom {worker}"), format!("at {sequence}"));
                    logger.error(&format!("worker {worker} record {sequence}"), Some(&detail));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let contents = fs::read_to_string(logger.path()).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(THREADS * RECORDS_PER_THREAD * 3, lines.len());

    for record in lines.chunks(3) {
        let header = record[0]
            .strip_prefix("[2024-03-15 12:00:00] [Error] worker ")
            .unwrap();
        let (worker, sequence) = header.split_once(" record ").unwrap();
        assert_eq!(format!("Exception: boom {worker}"), record[1]);
        assert_eq!(format!("Stack Trace: at {sequence}"), record[2]);
    }
}

#[test]
fn test_concurrent_single_line_records() {
    let root = tempfile::tempdir().unwrap();
    let logger = shared_logger(root.path());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let logger = &logger;
            scope.spawn(move || {
                for sequence in 0..RECORDS_PER_THREAD {
                    logger.info(&format!("{worker}:{sequence}"));
                }
            });
        }
    });

    let contents = fs::read_to_string(logger.path()).unwrap();
    let mut seen: Vec<_> = contents
        .lines()
        .map(|line| {
            line.strip_prefix("[2024-03-15 12:00:00] [Info] ")
                .unwrap()
                .to_string()
        })
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(THREADS * RECORDS_PER_THREAD, seen.len());
}
