/// Header numbers of a running session: "Question n of m", "Score s/a", "% complete".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// One-based position of the current question.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub score: u32,
    /// `None` for untimed sessions.
    pub remaining_seconds: Option<u32>,
    pub percent: u32,
}

impl SessionProgress {
    pub(crate) fn new(
        index: usize,
        total: usize,
        answered: usize,
        score: u32,
        remaining_seconds: Option<u32>,
    ) -> Self {
        let position = (index + 1).min(total);
        let percent = if total == 0 {
            0
        } else {
            let rounded = (position * 200 + total) / (total * 2);
            u32::try_from(rounded).unwrap_or(100)
        };
        Self {
            position,
            total,
            answered,
            score,
            remaining_seconds,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_tracks_position_and_rounds() {
        assert_eq!(SessionProgress::new(0, 3, 0, 0, None).percent, 33);
        assert_eq!(SessionProgress::new(1, 3, 1, 1, None).percent, 67);
        assert_eq!(SessionProgress::new(2, 3, 2, 1, None).percent, 100);
        assert_eq!(SessionProgress::new(0, 0, 0, 0, None).percent, 0);
    }
}
