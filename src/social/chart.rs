//! Chart collaborator contracts
//!
//! Rendering and upload are external concerns: the pipeline hands an
//! ordered set of labeled series to a renderer and ships the returned
//! bytes to an uploader that yields a public URL. The crate carries the
//! contracts and disabled defaults; styling lives elsewhere.

use anyhow::{bail, Result};

use crate::store::SessionPoint;

/// Bar for a single session, line across sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
        }
    }
}

/// One labeled series. Bar charts carry a single point per series.
#[derive(Debug, Clone)]
pub struct StatSeries {
    pub label: String,
    pub points: Vec<SessionPoint>,
}

/// Everything a renderer needs for one image
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub player_name: String,
    pub game_name: String,
    pub game_installment: Option<String>,
    pub series: Vec<StatSeries>,
}

/// Renders a chart request into encoded image bytes
pub trait ChartRenderer: Send + Sync {
    fn render(&self, request: &ChartRequest) -> Result<Vec<u8>>;
}

/// Uploads an image and returns its public URL
pub trait ChartUploader: Send + Sync {
    fn upload(&self, image: &[u8], object_name: &str) -> Result<String>;
}

/// Default renderer: always refuses, which downgrades the social
/// pipeline to a logged skip.
pub struct DisabledRenderer;

impl ChartRenderer for DisabledRenderer {
    fn render(&self, _request: &ChartRequest) -> Result<Vec<u8>> {
        bail!("chart renderer not configured")
    }
}

/// Default uploader: always refuses.
pub struct DisabledUploader;

impl ChartUploader for DisabledUploader {
    fn upload(&self, _image: &[u8], _object_name: &str) -> Result<String> {
        bail!("chart uploader not configured")
    }
}
