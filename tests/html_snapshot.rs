mod common;

use common::{DocxBuilder, drawing_xml, image_rels_xml};
use docx_fidelity::html::{build_html_snapshot, render_snapshot};
use docx_fidelity::parse_bytes;

const HEADING_STYLES: &str = r#"
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/></w:style>
"#;

const NUMBERING: &str = r#"
<w:abstractNum w:abstractNumId="0">
  <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/></w:lvl>
</w:abstractNum>
<w:num w:numId="3"><w:abstractNumId w:val="0"/></w:num>
"#;

fn snapshot(builder: DocxBuilder) -> String {
    let model = parse_bytes(&builder.build(), "snapshot.docx").unwrap();
    render_snapshot(&model)
}

#[test]
fn wraps_a_fragment_in_a_document() {
    let html = build_html_snapshot("<p>Hello</p>");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<meta charset=\"utf-8\"/>"));
    assert!(html.contains("<body><p>Hello</p></body>"));
}

#[test]
fn full_documents_pass_through() {
    let doc = "<HTML><body><p>Already whole</p></body></HTML>";
    assert_eq!(build_html_snapshot(doc), doc);
}

#[test]
fn blank_input_yields_an_empty_shell() {
    assert_eq!(
        build_html_snapshot("  \n "),
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/></head><body></body></html>"
    );
}

#[test]
fn headings_become_heading_elements() {
    let _ = env_logger::try_init();
    let html = snapshot(
        DocxBuilder::new(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Overview</w:t></w:r></w:p>
               <w:p><w:r><w:t>Body</w:t></w:r></w:p>"#,
        )
        .styles(HEADING_STYLES),
    );

    assert!(html.contains("<h1 class=\"Heading1\" data-word-p-index=\"0\""));
    assert!(html.contains(">Overview</h1>"));
    assert!(html.contains("<p class=\"Normal\" data-word-p-index=\"1\""));
}

#[test]
fn images_are_sized_from_their_extent() {
    let body = format!(
        "<w:p><w:r>{}</w:r></w:p><w:p><w:r>{}</w:r></w:p>",
        drawing_xml("rId1", 1828800, 914400),
        drawing_xml("rId7", 952500, 952500),
    );
    let html = snapshot(
        DocxBuilder::new(&body)
            .part(
                "word/_rels/document.xml.rels",
                image_rels_xml(&[("rId1", "media/image1.png")]),
            )
            .part("word/media/image1.png", b"\x89PNG\r\n\x1a\n".to_vec()),
    );

    assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
    assert!(html.contains("width=\"192\" height=\"96\""));
    assert!(html.contains("width:192.00px"));
    assert!(html.contains("height:96.00px"));
    assert!(html.contains("data-word-unresolved=\"rId7\""));
    assert!(html.contains("width=\"100\" height=\"100\""));
}

#[test]
fn tables_keep_their_grid() {
    let body = r#"<w:tbl>
        <w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>Header</w:t></w:r></w:p></w:tc></w:tr>
        <w:tr>
          <w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr><w:p><w:r><w:t>Merged</w:t></w:r></w:p></w:tc>
          <w:tc><w:p><w:r><w:t>Right 1</w:t></w:r></w:p></w:tc>
        </w:tr>
        <w:tr>
          <w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc>
          <w:tc><w:p><w:r><w:t>Right 2</w:t></w:r></w:p></w:tc>
        </w:tr>
      </w:tbl>"#;
    let html = snapshot(DocxBuilder::new(body));

    assert!(html.contains("<table"));
    assert!(html.contains("border-collapse:collapse"));
    assert!(html.contains("<td colspan=\"2\""));
    assert!(html.contains("<td rowspan=\"2\""));
    assert_eq!(html.matches("<td").count(), 4);
    assert_eq!(html.matches("<tr>").count(), 3);
    for text in ["Header", "Merged", "Right 1", "Right 2"] {
        assert!(html.contains(text), "missing {text}");
    }
    assert!(html.contains("padding:0.00px 7.20px 0.00px 7.20px"));
    assert!(!html.contains("border:"));
}

#[test]
fn list_markers_count_up() {
    let item = |text: &str| {
        format!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="3"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
        )
    };
    let html = snapshot(DocxBuilder::new(&format!("{}{}", item("alpha"), item("beta"))).numbering(NUMBERING));

    assert!(html.contains(">1. </span>alpha"));
    assert!(html.contains(">2. </span>beta"));
    assert_eq!(html.matches("__word-list-marker").count(), 2);
}

#[test]
fn empty_paragraphs_and_escaping() {
    let html = snapshot(DocxBuilder::new(
        r#"<w:p/><w:p><w:r><w:t>a &lt; b &amp; c</w:t><w:br/><w:t>next</w:t></w:r></w:p>"#,
    ));

    assert!(html.contains("data-word-empty=\"1\"><br/></p>"));
    assert!(html.contains("a &lt; b &amp; c<br/>next"));
}

#[test]
fn run_formatting_is_inlined() {
    let html = snapshot(DocxBuilder::new(
        r#"<w:p><w:r><w:rPr><w:b/><w:u w:val="single"/><w:color w:val="C00000"/><w:sz w:val="30"/></w:rPr><w:t>loud</w:t></w:r></w:p>"#,
    ));

    assert!(html.contains(
        "<span style=\"font-size:20.00px;color:#C00000;font-weight:700;text-decoration:underline\">loud</span>"
    ));
}

#[test]
fn rendering_is_deterministic() {
    let bytes = DocxBuilder::new(
        r#"<w:p><w:r><w:t>same</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
    )
    .build();
    let model = parse_bytes(&bytes, "same.docx").unwrap();
    assert_eq!(render_snapshot(&model), render_snapshot(&model));
}
