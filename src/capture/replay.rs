//! Recorded detector output played back as a capture session.
//!
//! File format is JSON lines: a header object naming the classes, then one
//! array of detections per frame (an empty array is a frame with nothing in it).
//!
//! ```text
//! {"classes": ["person", "bicycle", "car"]}
//! [{"classId": 0, "confidence": 0.91, "x": 120, "y": 80, "width": 40, "height": 110, "trackId": 1}]
//! []
//! ```

use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use serde::Deserialize;

use super::adapter::{CaptureSource, Detection, DetectionAdapter, Frame};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Header { classes: Vec<String> },
    Frame(Vec<Detection>),
}

/// Yields one placeholder frame per recorded frame.
pub struct ReplaySource {
    remaining: usize,
}

impl ReplaySource {
    pub fn new(frames: usize) -> Self {
        Self { remaining: frames }
    }
}

impl CaptureSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbImage::new(1, 1)))
    }
}

/// Returns the recorded detections in order, one frame per call.
pub struct ReplayDetector {
    classes: Vec<String>,
    frames: VecDeque<Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(classes: Vec<String>, frames: Vec<Vec<Detection>>) -> Self {
        Self {
            classes,
            frames: frames.into(),
        }
    }
}

impl DetectionAdapter for ReplayDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.frames
            .pop_front()
            .ok_or_else(|| anyhow!("replay has no more recorded frames"))
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.classes.get(class_id as usize).map(String::as_str)
    }
}

pub struct Replay {
    pub source: ReplaySource,
    pub detector: ReplayDetector,
}

pub fn load_replay(path: &Path) -> Result<Replay> {
    let file =
        File::open(path).with_context(|| format!("failed to open replay {}", path.display()))?;
    parse_replay(BufReader::new(file))
        .with_context(|| format!("failed to parse replay {}", path.display()))
}

fn parse_replay(reader: impl BufRead) -> Result<Replay> {
    let mut classes: Option<Vec<String>> = None;
    let mut frames = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: ReplayLine = serde_json::from_str(&line)
            .with_context(|| format!("line {} is not a header or detection array", index + 1))?;
        match parsed {
            ReplayLine::Header { classes: names } => {
                if classes.is_some() {
                    bail!("duplicate classes header on line {}", index + 1);
                }
                classes = Some(names);
            }
            ReplayLine::Frame(detections) => {
                if classes.is_none() {
                    bail!("frame on line {} precedes the classes header", index + 1);
                }
                frames.push(detections);
            }
        }
    }

    let classes = classes.ok_or_else(|| anyhow!("replay has no classes header"))?;
    Ok(Replay {
        source: ReplaySource::new(frames.len()),
        detector: ReplayDetector::new(classes, frames),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = r#"{"classes": ["person", "bicycle", "car"]}
[{"classId": 0, "confidence": 0.91, "x": 120, "y": 80, "width": 40, "height": 110, "trackId": 1}]

[]
[{"classId": 2, "confidence": 0.4, "x": 10, "y": 10, "width": 5, "height": 5}]
"#;

    #[test]
    fn parses_header_and_frames() {
        let mut replay = parse_replay(Cursor::new(SAMPLE)).unwrap();
        let frame = RgbImage::new(1, 1);

        let first = replay.detector.detect(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].track_id, Some(1));
        assert_eq!(replay.detector.class_name(first[0].class_id), Some("person"));

        assert!(replay.detector.detect(&frame).unwrap().is_empty());

        let third = replay.detector.detect(&frame).unwrap();
        assert_eq!(third[0].track_id, None);
        assert_eq!(replay.detector.class_name(7), None);

        assert!(replay.detector.detect(&frame).is_err());
    }

    #[test]
    fn source_yields_one_frame_per_line() {
        let mut replay = parse_replay(Cursor::new(SAMPLE)).unwrap();
        let mut frames = 0;
        while replay.source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 3);
    }

    #[test]
    fn header_is_required_first() {
        let err = parse_replay(Cursor::new("[]\n")).err().unwrap();
        assert!(err.to_string().contains("precedes"));
        assert!(parse_replay(Cursor::new("")).is_err());
    }
}
