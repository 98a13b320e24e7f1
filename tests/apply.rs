mod common;

use common::{DocxBuilder, ScriptedOracle, count_attr, count_class, drawing_xml, image_rels_xml, node};
use docx_fidelity::audit::build_structure_report;
use docx_fidelity::html::render_snapshot;
use docx_fidelity::model::{Alignment, LineHeight, ListBinding, NumberFormat, ParagraphProfile, Run, RunStyle};
use docx_fidelity::profile::TrailingSignature;
use docx_fidelity::render::{
    ANCHOR_CLASS, MARKER_CLASS, NATIVE_MARKER_ATTR, SIGNATURE_SPACER_ATTR, STYLE_BLOCK_ID,
    VIEW_OPTIONS_ID,
};
use docx_fidelity::{
    ApplyOptions, ApplyReport, Diagnostic, Dom, UnmeasuredOracle, VisualTree, WordStyleProfile,
    apply_render_model, extract, parse_bytes,
};

fn apply(dom: &mut Dom, profile: &WordStyleProfile) -> ApplyReport {
    let options = ApplyOptions {
        paginate: false,
        ..ApplyOptions::default()
    };
    apply_render_model(dom, Some(profile), &mut UnmeasuredOracle, &options)
}

fn listed(index: usize, text: &str, binding: ListBinding) -> ParagraphProfile {
    ParagraphProfile {
        list: Some(binding),
        ..ParagraphProfile::with_text(index, text)
    }
}

#[test]
fn style_block_and_body_width_are_written_once() {
    let _ = env_logger::try_init();
    let mut dom = Dom::parse("<p>Hello</p>");
    let profile = WordStyleProfile::with_paragraphs(vec![ParagraphProfile::with_text(0, "Hello")]);

    apply(&mut dom, &profile);
    apply(&mut dom, &profile);

    let head = dom.head();
    let blocks: Vec<_> = dom
        .children(head)
        .into_iter()
        .filter(|n| dom.attribute(*n, "id") == Some(STYLE_BLOCK_ID))
        .collect();
    assert_eq!(blocks.len(), 1);
    let css = dom.text_content(blocks[0]);
    assert!(css.contains("font-size: 14.6667px !important"));
    assert!(css.contains("width: 553.73px !important"));
    assert!(dom.element_by_id(VIEW_OPTIONS_ID).is_some());
    assert_eq!(
        dom.style_property(dom.body(), "width").as_deref(),
        Some("553.73px")
    );
}

#[test]
fn nested_list_markers_follow_the_level_pattern() {
    let mut dom = Dom::parse(r#"<p id="a">First</p><p id="b">Second</p><p id="c">Third</p>"#);
    let nested = ListBinding {
        level_formats: vec![NumberFormat::Decimal, NumberFormat::LowerLetter],
        ..ListBinding::new(10, 1, NumberFormat::LowerLetter, "%1.%2.")
    };
    let profile = WordStyleProfile::with_paragraphs(vec![
        listed(0, "First", ListBinding::new(10, 0, NumberFormat::Decimal, "%1.")),
        listed(1, "Second", nested.clone()),
        listed(2, "Third", nested),
    ]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.markers, 3);
    assert!(dom.text_content(node(&dom, "a")).starts_with("1."));
    assert!(dom.text_content(node(&dom, "b")).starts_with("1.a."));
    assert!(dom.text_content(node(&dom, "c")).starts_with("1.b."));
}

#[test]
fn section_break_restarts_numbering() {
    let mut dom = Dom::parse(r#"<p id="a">one</p><p id="b">two</p><p id="c">three</p>"#);
    let binding = ListBinding::new(5, 0, NumberFormat::Decimal, "%1.");
    let mut restarted = listed(1, "two", binding.clone());
    restarted.section_break_before = true;
    let profile = WordStyleProfile::with_paragraphs(vec![
        listed(0, "one", binding.clone()),
        restarted,
        listed(2, "three", binding),
    ]);

    apply(&mut dom, &profile);

    assert_eq!(dom.text_content(node(&dom, "a")), "1. one");
    assert_eq!(dom.text_content(node(&dom, "b")), "1. two");
    assert_eq!(dom.text_content(node(&dom, "c")), "2. three");
}

#[test]
fn runs_are_rewritten_when_text_matches() {
    let mut dom = Dom::parse(r#"<p id="r">Bold strike</p>"#);
    let mut paragraph = ParagraphProfile::with_text(0, "Bold strike");
    paragraph.runs = vec![
        Run {
            text: "Bold ".to_string(),
            style: RunStyle {
                bold: true,
                ..RunStyle::default()
            },
            image: None,
        },
        Run {
            text: "strike".to_string(),
            style: RunStyle {
                strike: true,
                highlight_color: Some("#FFFF00".to_string()),
                shading_color: Some("#CCCCCC".to_string()),
                ..RunStyle::default()
            },
            image: None,
        },
    ];
    let profile = WordStyleProfile::with_paragraphs(vec![paragraph]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.runs_rewritten, 1);
    let p = node(&dom, "r");
    let spans = dom.children(p);
    assert_eq!(spans.len(), 2);
    assert_eq!(dom.style_property(spans[0], "font-weight").as_deref(), Some("700"));
    assert_eq!(
        dom.style_property(spans[1], "text-decoration").as_deref(),
        Some("line-through")
    );
    assert_eq!(
        dom.style_property(spans[1], "background-color").as_deref(),
        Some("#FFFF00")
    );
    assert_eq!(dom.text_content(p), "Bold strike");
}

#[test]
fn mismatched_text_is_left_alone() {
    let mut dom = Dom::parse(r#"<p id="r"><b>Something</b> else</p>"#);
    let profile = WordStyleProfile::with_paragraphs(vec![ParagraphProfile::with_text(0, "Different")]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.runs_rewritten, 0);
    assert_eq!(dom.inner_html(node(&dom, "r")), "<b>Something</b> else");
}

#[test]
fn paragraphs_with_images_keep_their_markup() {
    let mut dom = Dom::parse(r#"<p id="c">Hello <img src="x.png"></p>"#);
    let before = dom.inner_html(node(&dom, "c"));
    let profile = WordStyleProfile::with_paragraphs(vec![ParagraphProfile::with_text(0, "Hello")]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.runs_rewritten, 0);
    assert_eq!(dom.inner_html(node(&dom, "c")), before);
}

#[test]
fn fixed_line_heights_are_emitted_in_px() {
    let mut dom = Dom::parse(r#"<p id="a">a</p><p id="b">b</p><p id="c">c</p>"#);
    let with_line = |index: usize, text: &str, line: LineHeight| ParagraphProfile {
        line_height: Some(line),
        ..ParagraphProfile::with_text(index, text)
    };
    let profile = WordStyleProfile::with_paragraphs(vec![
        with_line(0, "a", LineHeight::Exact(24.0)),
        with_line(1, "b", LineHeight::AtLeast(22.0)),
        with_line(2, "c", LineHeight::Auto(1.5)),
    ]);

    apply(&mut dom, &profile);

    let line = |id: &str| dom.style_property(node(&dom, id), "line-height");
    assert_eq!(line("a").as_deref(), Some("24px"));
    assert_eq!(line("b").as_deref(), Some("22px"));
    assert_eq!(line("c").as_deref(), Some("1.500000"));
}

#[test]
fn paragraph_formatting_is_inlined() {
    let mut dom = Dom::parse(r#"<p id="p" style="text-align: center; color: red">text</p>"#);
    let mut paragraph = ParagraphProfile::with_text(0, "text");
    paragraph.alignment = Alignment::Justify;
    paragraph.before_px = Some(8.0);
    paragraph.indent.left_px = Some(32.0);
    let profile = WordStyleProfile::with_paragraphs(vec![paragraph]);

    apply(&mut dom, &profile);

    let p = node(&dom, "p");
    assert_eq!(dom.style_property(p, "text-align").as_deref(), Some("justify"));
    assert_eq!(dom.style_property(p, "margin-top").as_deref(), Some("8.00px"));
    assert_eq!(dom.style_property(p, "margin-left").as_deref(), Some("32.00px"));
    assert_eq!(dom.style_property(p, "color").as_deref(), Some("red"));
}

#[test]
fn flagged_paragraphs_keep_their_own_numbering() {
    let mut dom = Dom::parse(&format!(
        r#"<p id="d" {NATIVE_MARKER_ATTR}="1">1. 已存在编号文本</p><p id="plain">plain</p>"#
    ));
    let binding = ListBinding::new(1, 0, NumberFormat::Decimal, "%1.");
    let profile = WordStyleProfile::with_paragraphs(vec![
        listed(0, "已存在编号文本", binding.clone()),
        listed(1, "plain", binding),
    ]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.markers, 1);
    assert_eq!(count_class(&dom, MARKER_CLASS), 1);
    assert_eq!(dom.text_content(node(&dom, "d")), "1. 已存在编号文本");
    assert_eq!(dom.text_content(node(&dom, "plain")), "2. plain");
}

#[test]
fn markers_survive_a_pass_without_a_profile() {
    let mut dom = Dom::parse(r#"<p id="a">one</p>"#);
    let profile = WordStyleProfile::with_paragraphs(vec![listed(
        0,
        "one",
        ListBinding::new(1, 0, NumberFormat::Decimal, "%1."),
    )]);

    apply(&mut dom, &profile);
    assert_eq!(dom.text_content(node(&dom, "a")), "1. one");

    apply_render_model(&mut dom, None, &mut UnmeasuredOracle, &ApplyOptions::default());

    assert_eq!(count_class(&dom, MARKER_CLASS), 1);
    assert_eq!(dom.text_content(node(&dom, "a")), "1. one");
}

#[test]
fn native_office_markers_are_respected() {
    let mut dom = Dom::parse(
        r#"<p id="n" class="MsoListParagraph" style="margin-left:36.0pt;text-indent:-18.0pt"><span style="mso-list:Ignore">1.</span>item</p>"#,
    );
    let profile = WordStyleProfile::with_paragraphs(vec![listed(
        0,
        "item",
        ListBinding::new(1, 0, NumberFormat::Decimal, "%1."),
    )]);

    let report = apply(&mut dom, &profile);

    assert_eq!(report.markers, 0);
    assert_eq!(count_class(&dom, MARKER_CLASS), 0);
}

#[test]
fn indexed_paragraphs_map_by_source_position() {
    let _ = env_logger::try_init();
    let mut dom = Dom::parse(
        r#"<h2 id="t" data-word-p-index="0">Title</h2>
           <p id="i" data-word-p-index="1">Item</p>
           <table><tr><td><p id="cell" data-word-p-index="2">Cell</p></td></tr></table>
           <p id="stray" data-word-p-index="9">Stray</p>"#,
    );
    let profile = WordStyleProfile::with_paragraphs(vec![
        ParagraphProfile::with_text(0, "Title"),
        listed(1, "Item", ListBinding::new(7, 0, NumberFormat::Bullet, "\u{2022}")),
        ParagraphProfile::with_text(2, "Cell"),
    ]);

    for _ in 0..2 {
        let report = apply(&mut dom, &profile);
        assert_eq!(report.paragraphs_formatted, 3);
        assert_eq!(report.markers, 1);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::ProfileTreeMismatch { profile: 3, tree: 4 }]
        );
    }

    assert_eq!(count_class(&dom, MARKER_CLASS), 1);
    assert_eq!(dom.text_content(node(&dom, "i")), "\u{2022} Item");
    assert_eq!(dom.text_content(node(&dom, "cell")), "Cell");
    assert!(dom.attribute(node(&dom, "t"), "style").is_some());
    assert!(dom.attribute(node(&dom, "stray"), "style").is_none());
}

fn signature_profile() -> WordStyleProfile {
    let mut closing = ParagraphProfile::with_text(3, "2024年1月1日");
    closing.alignment = Alignment::Right;
    WordStyleProfile {
        signature: Some(TrailingSignature {
            text: "2024年1月1日".to_string(),
            aligned_right: true,
            paragraph_index: 3,
            empty_paragraphs_before: 2,
        }),
        ..WordStyleProfile::with_paragraphs(vec![
            ParagraphProfile::with_text(0, "Body"),
            ParagraphProfile::with_text(1, ""),
            ParagraphProfile::with_text(2, ""),
            closing,
        ])
    }
}

#[test]
fn dropped_signature_spacing_is_restored() {
    let mut dom = Dom::parse(
        r#"<p data-word-p-index="0">Body</p><p id="sig" data-word-p-index="3">2024年1月1日</p>"#,
    );
    let profile = signature_profile();

    let first = apply(&mut dom, &profile);
    let second = apply(&mut dom, &profile);

    assert_eq!(first.signature_spacers, 2);
    assert_eq!(second.signature_spacers, 0);
    assert_eq!(count_attr(&dom, SIGNATURE_SPACER_ATTR), 2);

    let sig = node(&dom, "sig");
    let previous = dom.previous_element_sibling(sig).unwrap();
    assert_eq!(dom.attribute(previous, SIGNATURE_SPACER_ATTR), Some("1"));
    assert_eq!(dom.attribute(previous, "data-word-empty"), Some("1"));
    assert!(dom.has_class(sig, ANCHOR_CLASS));
    assert_eq!(dom.style_property(sig, "text-align").as_deref(), Some("right"));
}

#[test]
fn closing_without_blank_lines_before_it_is_not_anchored() {
    let mut dom = Dom::parse(
        r#"<p data-word-p-index="0">Body</p><p id="sig" data-word-p-index="3">2024年1月1日</p>"#,
    );
    let mut profile = signature_profile();
    if let Some(signature) = profile.signature.as_mut() {
        signature.empty_paragraphs_before = 0;
    }

    let report = apply(&mut dom, &profile);

    assert_eq!(report.signature_spacers, 0);
    assert!(!dom.has_class(node(&dom, "sig"), ANCHOR_CLASS));
}

#[test]
fn signature_followed_by_content_is_not_anchored() {
    let mut dom = Dom::parse(
        r#"<p id="body" data-word-p-index="0">Body</p><p id="sig" data-word-p-index="3">2024年1月1日</p><p><img src="stamp.png"></p>"#,
    );

    let report = apply(&mut dom, &signature_profile());

    assert_eq!(report.signature_spacers, 0);
    assert_eq!(count_attr(&dom, SIGNATURE_SPACER_ATTR), 0);
    let sig = node(&dom, "sig");
    assert!(!dom.has_class(sig, ANCHOR_CLASS));
    assert_eq!(dom.previous_element_sibling(sig), Some(node(&dom, "body")));
}

#[test]
fn wide_images_are_contained() {
    let mut dom = Dom::parse(
        r#"<p><img id="big" src="x.png" style="width:900px;height:450px"></p><p><img id="small" src="y.png" width="200"></p>"#,
    );
    let profile = WordStyleProfile::with_paragraphs(Vec::new());

    let report = apply(&mut dom, &profile);

    assert_eq!(report.images_contained, 1);
    let big = node(&dom, "big");
    assert_eq!(dom.style_property(big, "max-width").as_deref(), Some("553.73px"));
    assert_eq!(dom.style_property(big, "height").as_deref(), Some("auto"));
    assert!(dom.attribute(node(&dom, "small"), "style").is_none());
}

#[test]
fn unsized_images_are_judged_by_their_measured_box() {
    let mut dom = Dom::parse(
        r#"<p><img id="pasted" src="x.png"></p><p><img id="fits" src="y.png"></p>"#,
    );
    let mut oracle = ScriptedOracle::new();
    oracle.set_box(node(&dom, "pasted"), 0.0, 0.0, 900.0, 300.0);
    oracle.set_box(node(&dom, "fits"), 300.0, 0.0, 400.0, 200.0);
    let options = ApplyOptions {
        paginate: false,
        ..ApplyOptions::default()
    };
    let profile = WordStyleProfile::with_paragraphs(Vec::new());

    let report = apply_render_model(&mut dom, Some(&profile), &mut oracle, &options);

    assert_eq!(report.images_contained, 1);
    let pasted = node(&dom, "pasted");
    assert_eq!(dom.style_property(pasted, "max-width").as_deref(), Some("553.73px"));
    assert_eq!(dom.style_property(pasted, "height").as_deref(), Some("auto"));
    assert!(dom.attribute(node(&dom, "fits"), "style").is_none());
}

#[test]
fn legacy_office_markup_is_normalized_without_a_profile() {
    let mut dom = Dom::parse(
        r#"<p id="m" style="mso-line-height-alt:18.0pt;mso-margin-bottom-alt:12.0pt">x</p>
           <p id="k" style="mso-margin-top-alt:auto;line-height:20px;mso-line-height-alt:30px">y</p>
           <p id="l" class="MsoListParagraphCxSpFirst" style="margin-left:36.0pt;text-indent:-18.0pt"><span id="native" style="mso-list:Ignore">1.</span>item</p>
           <p id="e"><span> </span></p>"#,
    );

    let report = apply_render_model(&mut dom, None, &mut UnmeasuredOracle, &ApplyOptions::default());

    let style = |id: &str, property: &str| dom.style_property(node(&dom, id), property);
    assert_eq!(style("m", "line-height").as_deref(), Some("18.0pt"));
    assert_eq!(style("m", "margin-bottom").as_deref(), Some("12.0pt"));
    assert_eq!(style("k", "margin-top"), None);
    assert_eq!(style("k", "line-height").as_deref(), Some("20px"));
    assert_eq!(style("l", "padding-left").as_deref(), Some("36.0pt"));
    assert_eq!(style("l", "margin-left").as_deref(), Some("0"));
    assert_eq!(style("l", "text-indent").as_deref(), Some("0"));
    assert_eq!(
        dom.attribute(node(&dom, "native"), "data-word-native-marker"),
        Some("1")
    );

    let empty = node(&dom, "e");
    let children = dom.children(empty);
    assert_eq!(children.len(), 1);
    assert_eq!(dom.tag_name(children[0]), Some("br"));
    assert_eq!(dom.attribute(empty, "data-word-empty"), Some("1"));
    assert_eq!(report.empty_paragraphs, 1);
    assert_eq!(report.paragraphs_formatted, 0);
    assert!(dom.element_by_id(STYLE_BLOCK_ID).is_none());

    let once = dom.to_html();
    apply_render_model(&mut dom, None, &mut UnmeasuredOracle, &ApplyOptions::default());
    assert_eq!(dom.to_html(), once);
}

#[test]
fn formatting_marks_are_opt_in() {
    let mut dom = Dom::parse("<p>x</p>");
    let marks = ApplyOptions {
        show_formatting_marks: true,
        paginate: false,
    };

    apply_render_model(&mut dom, None, &mut UnmeasuredOracle, &marks);
    let view = dom.element_by_id(VIEW_OPTIONS_ID).unwrap();
    assert!(dom.text_content(view).contains('\u{21b5}'));

    apply_render_model(&mut dom, None, &mut UnmeasuredOracle, &ApplyOptions::default());
    assert!(!dom.text_content(view).contains('\u{21b5}'));
}

const ROUND_TRIP_STYLES: &str = r#"
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/>
  <w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/>
  <w:pPr><w:keepNext/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
"#;

const ROUND_TRIP_NUMBERING: &str = r#"
<w:abstractNum w:abstractNumId="0">
  <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/></w:lvl>
</w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
"#;

fn round_trip_docx() -> Vec<u8> {
    let item = |text: &str| {
        format!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    };
    let body = format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly summary</w:t></w:r></w:p>
           <w:p><w:r><w:t>Revenue grew </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>twelve percent</w:t></w:r><w:r><w:t>.</w:t></w:r></w:p>
           {}{}
           <w:p/>
           <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
           <w:p><w:r>{}</w:r></w:p>
           <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>line two</w:t></w:r></w:p>"#,
        item("first item"),
        item("second item"),
        drawing_xml("rId1", 1828800, 914400),
    );
    DocxBuilder::new(&body)
        .styles(ROUND_TRIP_STYLES)
        .numbering(ROUND_TRIP_NUMBERING)
        .part(
            "word/_rels/document.xml.rels",
            image_rels_xml(&[("rId1", "media/image1.png")]),
        )
        .part("word/media/image1.png", b"\x89PNG\r\n\x1a\n".to_vec())
        .build()
}

#[test]
fn applying_twice_yields_identical_markup() {
    let _ = env_logger::try_init();
    let model = parse_bytes(&round_trip_docx(), "round-trip.docx").unwrap();
    let profile = extract(&model);
    let mut dom = Dom::parse(&render_snapshot(&model));

    let first = apply_render_model(&mut dom, Some(&profile), &mut UnmeasuredOracle, &ApplyOptions::default());
    let once = dom.to_html();
    let second = apply_render_model(&mut dom, Some(&profile), &mut UnmeasuredOracle, &ApplyOptions::default());

    assert_eq!(dom.to_html(), once);
    assert!(first.diagnostics.is_empty(), "{:?}", first.diagnostics);
    assert_eq!(first.markers, 2);
    assert_eq!(second.markers, 2);
    assert_eq!(count_class(&dom, MARKER_CLASS), 2);
    assert_eq!(first.paragraphs_formatted, profile.paragraphs.len());

    let report = build_structure_report(&dom, Some(&profile));
    assert!(report.pass, "{:?}", report.rows);
}
