//! Sliding-window grouping of fragments.

use super::{Fragment, Speaker};
use crate::error::{FallaxError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Limits for the windows produced by the grouper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrouperConfig {
    /// Token budget per window. A single fragment larger than this still
    /// forms a window on its own.
    pub max_tokens: usize,
    /// Hard cap on fragments per window.
    pub max_fragments: usize,
    /// Index of the first fragment that may anchor a window. Earlier
    /// fragments only ever appear as context.
    pub window_start: usize,
}

impl GrouperConfig {
    pub fn new(max_tokens: usize, max_fragments: usize, window_start: usize) -> Result<Self> {
        let config = Self {
            max_tokens,
            max_fragments,
            window_start,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(FallaxError::Config("max_tokens must be greater than 0".to_string()));
        }
        if self.max_fragments < 2 {
            return Err(FallaxError::Config(format!(
                "max_fragments must be at least 2 (got {}), otherwise no context is kept",
                self.max_fragments
            )));
        }
        Ok(())
    }
}

impl Default for GrouperConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            max_fragments: 8,
            window_start: 1,
        }
    }
}

/// A contiguous run of fragments ending at the anchor fragment.
///
/// Windows borrow from the split output, so consecutive windows share
/// fragments without copying them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    first: usize,
    fragments: &'a [Fragment],
}

impl<'a> Window<'a> {
    /// Build a window from a non-empty slice starting at document index `first`.
    pub fn new(first: usize, fragments: &'a [Fragment]) -> Result<Self> {
        if fragments.is_empty() {
            return Err(FallaxError::InvalidInput("a window needs at least one fragment".to_string()));
        }
        Ok(Self { first, fragments })
    }

    pub fn fragments(&self) -> &'a [Fragment] {
        self.fragments
    }

    /// The fragment under judgment.
    pub fn anchor(&self) -> &'a Fragment {
        &self.fragments[self.fragments.len() - 1]
    }

    /// Fragments preceding the anchor.
    pub fn context(&self) -> &'a [Fragment] {
        &self.fragments[..self.fragments.len() - 1]
    }

    pub fn speaker(&self) -> &'a Speaker {
        &self.anchor().speaker
    }

    /// Document index of the first fragment.
    pub fn first_index(&self) -> usize {
        self.first
    }

    /// Document index of the anchor fragment.
    pub fn anchor_index(&self) -> usize {
        self.first + self.fragments.len() - 1
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn token_total(&self) -> usize {
        self.fragments.iter().map(|f| f.token_length).sum()
    }

    pub fn start_char(&self) -> usize {
        self.fragments[0].start_char
    }

    pub fn end_char(&self) -> usize {
        self.anchor().end_char
    }
}

/// Groups fragments into overlapping, budget-bounded windows.
///
/// One window is emitted per fragment from `window_start` on; window `k`
/// is anchored at fragment `window_start + k`.
#[derive(Debug, Clone)]
pub struct SlidingWindowGrouper {
    config: GrouperConfig,
}

impl SlidingWindowGrouper {
    pub fn new(config: GrouperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn group<'a>(&self, fragments: &'a [Fragment]) -> Vec<Window<'a>> {
        let GrouperConfig {
            max_tokens,
            max_fragments,
            window_start,
        } = self.config;

        // The working deque is fragments[start..i]; only its front moves.
        let mut start = 0;
        let seed = window_start.min(fragments.len());
        let mut running: usize = fragments[..seed].iter().map(|f| f.token_length).sum();

        let mut windows = Vec::with_capacity(fragments.len().saturating_sub(window_start));

        for i in window_start..fragments.len() {
            running += fragments[i].token_length;

            while start < i && (running > max_tokens || i - start > max_fragments - 1) {
                running -= fragments[start].token_length;
                start += 1;
            }

            windows.push(Window {
                first: start,
                fragments: &fragments[start..=i],
            });
        }

        debug!(
            "Grouped {} fragments into {} windows (max_tokens={}, max_fragments={}, window_start={})",
            fragments.len(),
            windows.len(),
            max_tokens,
            max_fragments,
            window_start
        );

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(lengths: &[usize]) -> Vec<Fragment> {
        let mut cursor = 0;
        lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| {
                let text = format!("fragment {}", i);
                let start_char = cursor;
                let end_char = start_char + text.len();
                cursor = end_char + 2;
                Fragment {
                    speaker: Speaker::named("speaker"),
                    text,
                    token_length: len,
                    start_char,
                    end_char,
                }
            })
            .collect()
    }

    fn grouper(max_tokens: usize, max_fragments: usize, window_start: usize) -> SlidingWindowGrouper {
        SlidingWindowGrouper::new(GrouperConfig::new(max_tokens, max_fragments, window_start).unwrap()).unwrap()
    }

    fn spans(windows: &[Window<'_>]) -> Vec<(usize, usize)> {
        windows.iter().map(|w| (w.first_index(), w.anchor_index())).collect()
    }

    #[test]
    fn test_eviction_trace() {
        let frags = fragments(&[4, 4, 5, 5, 5]);
        let windows = grouper(10, 3, 2).group(&frags);

        assert_eq!(windows.len(), 3);
        // 4+4+5 = 13 > 10, so fragment 0 is evicted.
        assert_eq!(spans(&windows), vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(windows[0].token_total(), 9);
        assert_eq!(windows[1].token_total(), 10);
        assert_eq!(windows[2].token_total(), 10);
    }

    #[test]
    fn test_fragment_cap_limits_window() {
        let frags = fragments(&[1; 10]);
        let windows = grouper(100, 3, 0).group(&frags);

        assert_eq!(windows.len(), 10);
        assert_eq!(spans(&windows)[..4], [(0, 0), (0, 1), (0, 2), (1, 3)]);
        assert!(windows.iter().all(|w| w.len() <= 3));
    }

    #[test]
    fn test_oversized_fragment_forms_its_own_window() {
        let frags = fragments(&[3, 50, 3, 3]);
        let windows = grouper(10, 4, 1).group(&frags);

        assert_eq!(spans(&windows), vec![(1, 1), (2, 2), (2, 3)]);
        assert_eq!(windows[0].len(), 1);
        assert_eq!(windows[0].token_total(), 50);
    }

    #[test]
    fn test_no_windows_when_too_few_fragments() {
        let frags = fragments(&[1, 1, 1]);
        assert!(grouper(10, 3, 3).group(&frags).is_empty());
        assert!(grouper(10, 3, 5).group(&frags).is_empty());
        assert!(grouper(10, 3, 0).group(&[]).is_empty());
    }

    #[test]
    fn test_window_properties_hold() {
        let lengths = [7, 2, 9, 1, 1, 12, 3, 3, 8, 4, 6, 2, 2, 2, 15, 1];
        let frags = fragments(&lengths);

        for window_start in 0..4 {
            for max_fragments in 2..6 {
                let max_tokens = 12;
                let windows = grouper(max_tokens, max_fragments, window_start).group(&frags);

                assert_eq!(windows.len(), lengths.len() - window_start);
                for (k, window) in windows.iter().enumerate() {
                    assert!(window.token_total() <= max_tokens || window.len() == 1);
                    assert!(window.len() <= max_fragments);
                    assert_eq!(window.anchor(), &frags[window_start + k]);
                    assert_eq!(window.anchor_index(), window_start + k);
                }
            }
        }
    }

    #[test]
    fn test_window_char_span() {
        let frags = fragments(&[1, 1, 1]);
        let windows = grouper(10, 3, 1).group(&frags);

        assert_eq!(windows[1].start_char(), frags[0].start_char);
        assert_eq!(windows[1].end_char(), frags[2].end_char);
        assert_eq!(windows[1].context().len(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(GrouperConfig::new(10, 1, 0).is_err());
        assert!(GrouperConfig::new(0, 4, 0).is_err());
        assert!(GrouperConfig::new(10, 2, 0).is_ok());
    }
}
