//! The proctoring event log: an append-only timestamped text file, one line
//! per observed event, separate from diagnostic tracing.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};

use crate::report::FrameReport;

/// The three reportable proctoring events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MultiplePeople,
    SuspiciousEye,
    SuspiciousMouth,
}

impl EventKind {
    pub fn message(&self) -> &'static str {
        match self {
            EventKind::MultiplePeople => "multiple people detected",
            EventKind::SuspiciousEye => "suspicious eye activity",
            EventKind::SuspiciousMouth => "suspicious mouth activity",
        }
    }
}

/// Append-only event sink. Write failures are reported through tracing and
/// never interrupt the frame loop.
pub struct EventLog {
    writer: BufWriter<File>,
}

impl EventLog {
    /// Open (or create) the log file for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!(path = %path.display(), "proctoring event log open");
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Record one event, timestamped with local time.
    pub fn record(&mut self, kind: EventKind) {
        let line = format_line(Local::now(), kind);
        tracing::info!(event = kind.message(), "proctoring event");
        if let Err(e) = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush()) {
            tracing::warn!(error = %e, "failed to append proctoring event");
        }
    }
}

/// Emit one frame's proctoring events: the multiple-people event at most
/// once per frame, the activity events once per flagged face.
pub fn record_frame(log: &mut EventLog, report: &FrameReport) {
    if report.multiple_people() {
        log.record(EventKind::MultiplePeople);
    }
    for face in &report.faces {
        if face.screening.suspicious_eyes {
            log.record(EventKind::SuspiciousEye);
        }
        if face.screening.suspicious_mouth {
            log.record(EventKind::SuspiciousMouth);
        }
    }
}

fn format_line(timestamp: DateTime<Local>, kind: EventKind) -> String {
    format!("{} - {}", timestamp.format("%Y-%m-%d %H:%M:%S"), kind.message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FaceObservation, FaceScreening};
    use crate::types::{FaceRegion, LandmarkPoint, LandmarkSet};
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let ts = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            format_line(ts, EventKind::MultiplePeople),
            "2026-03-14 09:26:53 - multiple people detected"
        );
    }

    #[test]
    fn test_messages_are_distinct() {
        assert_ne!(EventKind::SuspiciousEye.message(), EventKind::SuspiciousMouth.message());
        assert_ne!(EventKind::SuspiciousEye.message(), EventKind::MultiplePeople.message());
    }

    #[test]
    fn test_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");

        let mut log = EventLog::open(&path).unwrap();
        log.record(EventKind::SuspiciousEye);
        log.record(EventKind::SuspiciousMouth);
        drop(log);

        // Reopening must append, not truncate.
        let mut log = EventLog::open(&path).unwrap();
        log.record(EventKind::MultiplePeople);
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("suspicious eye activity"));
        assert!(lines[1].ends_with("suspicious mouth activity"));
        assert!(lines[2].ends_with("multiple people detected"));
    }

    fn face(suspicious_eyes: bool, suspicious_mouth: bool) -> FaceObservation {
        FaceObservation {
            region: FaceRegion {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.9,
            },
            landmarks: LandmarkSet::new([LandmarkPoint::new(0, 0); 68]),
            screening: FaceScreening {
                left_ear: Some(0.2),
                right_ear: Some(0.2),
                mouth_ratio: Some(0.05),
                suspicious_eyes,
                suspicious_mouth,
            },
        }
    }

    fn frame_lines(report: &FrameReport) -> Vec<String> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let mut log = EventLog::open(&path).unwrap();
        record_frame(&mut log, report);
        drop(log);
        std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_multiple_people_logged_once_per_frame() {
        let report = FrameReport {
            people_count: 3,
            faces: vec![face(false, false), face(false, false), face(false, false)],
        };
        let lines = frame_lines(&report);
        let count = lines
            .iter()
            .filter(|l| l.ends_with("multiple people detected"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_activity_events_logged_per_face() {
        let report = FrameReport {
            people_count: 2,
            faces: vec![face(true, true), face(true, false)],
        };
        let lines = frame_lines(&report);
        assert_eq!(
            lines.iter().filter(|l| l.ends_with("suspicious eye activity")).count(),
            2
        );
        assert_eq!(
            lines.iter().filter(|l| l.ends_with("suspicious mouth activity")).count(),
            1
        );
    }

    #[test]
    fn test_clean_frame_logs_nothing() {
        let report = FrameReport {
            people_count: 1,
            faces: vec![face(false, false)],
        };
        assert!(frame_lines(&report).is_empty());
    }
}
