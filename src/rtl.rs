use unicode_bidi::BidiInfo;

/// Prepare a string for a canvas that draws glyphs left-to-right with no
/// shaping of its own: join Arabic-script letters into their contextual
/// presentation forms, then reorder each paragraph into visual order.
/// Applied per drawn string, never to a whole document at once.
pub fn reshape(text: &str) -> String {
    let joined = arabic_reshaper::arabic_reshape(text);
    let bidi = BidiInfo::new(&joined, None);
    let mut out = String::with_capacity(joined.len());
    for para in &bidi.paragraphs {
        out.push_str(&bidi.reorder_line(para, para.range.clone()));
    }
    out
}
