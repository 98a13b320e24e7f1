//! List counters and marker text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::{ListBinding, NumberFormat};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"%(\d+)").unwrap());

/// Per-`numId` outline counters for one pass. `None` is a level that has not been
/// reached since the last restart.
#[derive(Clone, Debug, Default)]
pub struct ListCounterState {
    counters: HashMap<u32, Vec<Option<u32>>>,
}

impl ListCounterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every counter of `num_id`; the next paragraph starts at its `start_at`.
    pub fn reset(&mut self, num_id: u32) {
        self.counters.remove(&num_id);
    }

    /// Advance the counter of `binding`'s level, clear deeper levels, and return the
    /// marker text. A section break restarts the whole list first.
    pub fn next_marker(&mut self, binding: &ListBinding, section_break_before: bool) -> String {
        if section_break_before {
            self.reset(binding.num_id);
        }
        let level = binding.level;
        let levels = self.counters.entry(binding.num_id).or_default();
        if levels.len() <= level {
            levels.resize(level + 1, None);
        }
        let next = match levels[level] {
            Some(prev) => prev + 1,
            None => binding.start_at,
        };
        levels[level] = Some(next);
        for deeper in levels.iter_mut().skip(level + 1) {
            *deeper = None;
        }
        format_marker_by_pattern(binding, levels)
    }

    pub fn counters(&self, num_id: u32) -> &[Option<u32>] {
        self.counters.get(&num_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Plain marker for a format: `1.`, `a.`, `A.`, `i.`, `I.`, or a bullet.
pub fn format_marker(format: NumberFormat, counter: u32) -> String {
    match format {
        NumberFormat::Bullet => format.format(counter),
        _ => format!("{}.", format.format(counter)),
    }
}

/// Evaluate an `lvlText` pattern. `%N` refers to level N-1; a level whose counter is
/// unset or zero renders empty. Falls back to [`format_marker`] when nothing is left.
pub fn format_marker_by_pattern(binding: &ListBinding, counters: &[Option<u32>]) -> String {
    let current = counters.get(binding.level).copied().flatten().unwrap_or(1);
    if binding.pattern.trim().is_empty() {
        return format_marker(binding.format, current);
    }

    let replaced = PLACEHOLDER.replace_all(&binding.pattern, |caps: &Captures| {
        let Some(level) = caps[1].parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            return String::new();
        };
        let value = counters.get(level).copied().flatten().unwrap_or(0);
        if value == 0 {
            return String::new();
        }
        let format = if level == binding.level {
            binding.format
        } else {
            binding
                .level_formats
                .get(level)
                .copied()
                .unwrap_or(NumberFormat::Decimal)
        };
        if format == NumberFormat::Bullet {
            return String::new();
        }
        format.format(value)
    });

    let normalized = replaced.trim();
    if normalized.is_empty() {
        format_marker(binding.format, current)
    } else {
        normalized.to_string()
    }
}
