//! Invariants of pagination and list counters over generated inputs.

mod common;

use common::{ScriptedOracle, count_attr, node};
use docx_fidelity::model::{ListBinding, NumberFormat, ParagraphProfile};
use docx_fidelity::render::layout::{SPACER_ATTR, apply_keep_pagination};
use docx_fidelity::render::list::ListCounterState;
use docx_fidelity::{Dom, VisualTree, WordStyleProfile};
use proptest::prelude::*;

const CONTENT_HEIGHT: f32 = 100.0;

#[derive(Clone, Debug)]
struct Block {
    height: f32,
    keep_next: bool,
    keep_lines: bool,
    page_break_before: bool,
}

fn block() -> impl Strategy<Value = Block> {
    (5.0f32..140.0, any::<bool>(), any::<bool>(), prop::bool::weighted(0.1)).prop_map(
        |(height, keep_next, keep_lines, page_break_before)| Block {
            height,
            keep_next,
            keep_lines,
            page_break_before,
        },
    )
}

fn layout(blocks: &[Block]) -> (Dom, ScriptedOracle, WordStyleProfile) {
    let html: String = (0..blocks.len())
        .map(|i| format!("<p id=\"p{i}\">text {i}</p>"))
        .collect();
    let dom = Dom::parse(&html);
    let mut oracle = ScriptedOracle::new();
    let mut paragraphs = Vec::new();
    for (i, b) in blocks.iter().enumerate() {
        oracle.set_height(node(&dom, &format!("p{i}")), b.height);
        paragraphs.push(ParagraphProfile {
            keep_next: b.keep_next,
            keep_lines: b.keep_lines,
            page_break_before: b.page_break_before,
            ..ParagraphProfile::with_text(i, &format!("text {i}"))
        });
    }
    let mut profile = WordStyleProfile::with_paragraphs(paragraphs);
    profile.page.height_px = 220.0;
    profile.page.margin_top_px = 60.0;
    profile.page.margin_bottom_px = 60.0;
    (dom, oracle, profile)
}

fn has_spacer_before(dom: &Dom, id: &str) -> bool {
    dom.previous_element_sibling(node(dom, id))
        .is_some_and(|prev| dom.attribute(prev, SPACER_ATTR) == Some("1"))
}

#[test]
fn fitting_keep_next_pairs_are_never_split() {
    let _ = env_logger::try_init();
    proptest!(ProptestConfig::with_cases(64), |(blocks in prop::collection::vec(block(), 1..30))| {
        let (mut dom, mut oracle, profile) = layout(&blocks);
        apply_keep_pagination(&mut dom, &mut oracle, &profile);

        prop_assert!(!has_spacer_before(&dom, "p0"));
        for i in 1..blocks.len() {
            let (prev, cur) = (&blocks[i - 1], &blocks[i]);
            if prev.keep_next && prev.height + cur.height <= CONTENT_HEIGHT && !cur.page_break_before {
                prop_assert!(!has_spacer_before(&dom, &format!("p{i}")), "split after p{}", i - 1);
            }
        }
    });
}

#[test]
fn spacers_never_stack_and_passes_converge() {
    proptest!(ProptestConfig::with_cases(64), |(blocks in prop::collection::vec(block(), 1..30))| {
        let (mut dom, mut oracle, profile) = layout(&blocks);
        let first = apply_keep_pagination(&mut dom, &mut oracle, &profile);
        let once = dom.to_html();
        let second = apply_keep_pagination(&mut dom, &mut oracle, &profile);

        prop_assert_eq!(first, second);
        prop_assert_eq!(dom.to_html(), once);
        prop_assert_eq!(count_attr(&dom, SPACER_ATTR), first);
        for spacer in dom.elements_by_tag(dom.body(), &["div"]) {
            let stacked = dom
                .previous_element_sibling(spacer)
                .is_some_and(|prev| dom.attribute(prev, SPACER_ATTR).is_some());
            prop_assert!(!stacked);
        }
    });
}

#[test]
fn counters_climb_from_the_start_value() {
    proptest!(|(
        start in 1u32..5,
        steps in prop::collection::vec((0usize..3, prop::bool::weighted(0.1)), 1..40),
    )| {
        let mut state = ListCounterState::new();
        let mut last: [Option<u32>; 3] = [None; 3];
        for (level, restart) in steps {
            let binding = ListBinding {
                start_at: start,
                ..ListBinding::new(7, level, NumberFormat::Decimal, "%1.%2.%3.")
            };
            state.next_marker(&binding, restart);
            if restart {
                last = [None; 3];
            }

            let value = state.counters(7)[level];
            prop_assert_eq!(value, Some(last[level].map_or(start, |prev| prev + 1)));
            last[level] = value;
            for deeper in last.iter_mut().skip(level + 1) {
                *deeper = None;
            }
        }
    });
}
