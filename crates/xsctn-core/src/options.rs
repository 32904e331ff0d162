//! Parse options supplied by the caller

/// Placement of `RectangleDielectric` replicas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaLayout {
    /// Every replica at `-xOff`, based on the stack cursor; `-pitch` and
    /// `-yOff` are read but not applied
    #[default]
    Legacy,
    /// Replica `k` at `-xOff + k * -pitch`, based at cursor + `-yOff`
    Pitched,
}

/// Caller-side settings for a parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOptions {
    /// Pre-seeded contour segment count; a positive value wins over `CSEG`
    pub contour_segments: Option<u32>,
    /// Pre-seeded plane segment count; a positive value wins over `DSEG`
    pub plane_segments: Option<u32>,
    pub replica_layout: ReplicaLayout,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contour_segments(mut self, count: u32) -> Self {
        self.contour_segments = Some(count);
        self
    }

    pub fn with_plane_segments(mut self, count: u32) -> Self {
        self.plane_segments = Some(count);
        self
    }

    pub fn with_replica_layout(mut self, layout: ReplicaLayout) -> Self {
        self.replica_layout = layout;
        self
    }

    /// Seeded value if it is positive
    pub(crate) fn seeded_contour_segments(&self) -> Option<u32> {
        self.contour_segments.filter(|&n| n > 0)
    }

    pub(crate) fn seeded_plane_segments(&self) -> Option<u32> {
        self.plane_segments.filter(|&n| n > 0)
    }
}
