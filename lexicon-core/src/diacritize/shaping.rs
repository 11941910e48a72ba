//! Arabic display shaping.
//!
//! Terminals and most image/text widgets that lack a shaping engine render
//! Arabic as isolated letters in left-to-right order. [`shape_for_display`]
//! substitutes contextual presentation forms and then reorders the string
//! into visual order so it reads correctly on such surfaces.
//!
//! The output is for display only. Speech synthesis and any further text
//! processing must use the logical, unshaped string.

use unicode_bidi::BidiInfo;

/// How a letter connects to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Joins on both sides: isolated, final, initial, medial forms.
    Dual,
    /// Joins only to the preceding letter: isolated and final forms.
    Right,
    /// Never joins (hamza).
    None,
}

/// Letter, joining class, isolated form, initial form.
///
/// The final form follows the isolated one and the medial form follows the
/// initial one. Letters that never join forward have no initial form (0).
const LETTERS: &[(char, Joining, u32, u32)] = &[
    ('\u{0621}', Joining::None, 0xFE80, 0),
    ('\u{0622}', Joining::Right, 0xFE81, 0),
    ('\u{0623}', Joining::Right, 0xFE83, 0),
    ('\u{0624}', Joining::Right, 0xFE85, 0),
    ('\u{0625}', Joining::Right, 0xFE87, 0),
    ('\u{0626}', Joining::Dual, 0xFE89, 0xFE8B),
    ('\u{0627}', Joining::Right, 0xFE8D, 0),
    ('\u{0628}', Joining::Dual, 0xFE8F, 0xFE91),
    ('\u{0629}', Joining::Right, 0xFE93, 0),
    ('\u{062A}', Joining::Dual, 0xFE95, 0xFE97),
    ('\u{062B}', Joining::Dual, 0xFE99, 0xFE9B),
    ('\u{062C}', Joining::Dual, 0xFE9D, 0xFE9F),
    ('\u{062D}', Joining::Dual, 0xFEA1, 0xFEA3),
    ('\u{062E}', Joining::Dual, 0xFEA5, 0xFEA7),
    ('\u{062F}', Joining::Right, 0xFEA9, 0),
    ('\u{0630}', Joining::Right, 0xFEAB, 0),
    ('\u{0631}', Joining::Right, 0xFEAD, 0),
    ('\u{0632}', Joining::Right, 0xFEAF, 0),
    ('\u{0633}', Joining::Dual, 0xFEB1, 0xFEB3),
    ('\u{0634}', Joining::Dual, 0xFEB5, 0xFEB7),
    ('\u{0635}', Joining::Dual, 0xFEB9, 0xFEBB),
    ('\u{0636}', Joining::Dual, 0xFEBD, 0xFEBF),
    ('\u{0637}', Joining::Dual, 0xFEC1, 0xFEC3),
    ('\u{0638}', Joining::Dual, 0xFEC5, 0xFEC7),
    ('\u{0639}', Joining::Dual, 0xFEC9, 0xFECB),
    ('\u{063A}', Joining::Dual, 0xFECD, 0xFECF),
    ('\u{0641}', Joining::Dual, 0xFED1, 0xFED3),
    ('\u{0642}', Joining::Dual, 0xFED5, 0xFED7),
    ('\u{0643}', Joining::Dual, 0xFED9, 0xFEDB),
    ('\u{0644}', Joining::Dual, 0xFEDD, 0xFEDF),
    ('\u{0645}', Joining::Dual, 0xFEE1, 0xFEE3),
    ('\u{0646}', Joining::Dual, 0xFEE5, 0xFEE7),
    ('\u{0647}', Joining::Dual, 0xFEE9, 0xFEEB),
    ('\u{0648}', Joining::Right, 0xFEED, 0),
    // Alef maksura borrows its initial and medial forms from the extended block.
    ('\u{0649}', Joining::Dual, 0xFEEF, 0xFBE8),
    ('\u{064A}', Joining::Dual, 0xFEF1, 0xFEF3),
    ('\u{0671}', Joining::Right, 0xFB50, 0),
    // Persian and Urdu
    ('\u{067E}', Joining::Dual, 0xFB56, 0xFB58),
    ('\u{0686}', Joining::Dual, 0xFB7A, 0xFB7C),
    ('\u{0698}', Joining::Right, 0xFB8A, 0),
    ('\u{06A4}', Joining::Dual, 0xFB6A, 0xFB6C),
    ('\u{06A9}', Joining::Dual, 0xFB8E, 0xFB90),
    ('\u{06AF}', Joining::Dual, 0xFB92, 0xFB94),
    ('\u{06CC}', Joining::Dual, 0xFBFC, 0xFBFE),
];

const LAM: char = '\u{0644}';
const TATWEEL: char = '\u{0640}';

/// Alef variant and its lam-alef ligature (isolated form; final is +1).
const LAM_ALEF: &[(char, u32)] = &[
    ('\u{0622}', 0xFEF5),
    ('\u{0623}', 0xFEF7),
    ('\u{0625}', 0xFEF9),
    ('\u{0627}', 0xFEFB),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Isolated,
    Final,
    Initial,
    Medial,
}

#[derive(Debug, Clone, Copy)]
struct Letter {
    joining: Joining,
    isolated: u32,
    initial: u32,
}

fn letter(c: char) -> Option<Letter> {
    LETTERS
        .iter()
        .find(|(l, ..)| *l == c)
        .map(|&(_, joining, isolated, initial)| Letter {
            joining,
            isolated,
            initial,
        })
}

/// Harakat and other marks that sit on a letter without breaking joins.
pub fn is_transparent(c: char) -> bool {
    matches!(c, '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}')
}

fn joins_forward(c: char) -> bool {
    c == TATWEEL || letter(c).is_some_and(|l| l.joining == Joining::Dual)
}

fn joins_backward(c: char) -> bool {
    c == TATWEEL || letter(c).is_some_and(|l| l.joining != Joining::None)
}

fn presentation(letter: Letter, form: Form) -> char {
    let code = match (letter.joining, form) {
        (Joining::None, _) | (_, Form::Isolated) => letter.isolated,
        (_, Form::Final) => letter.isolated + 1,
        (Joining::Dual, Form::Initial) => letter.initial,
        (Joining::Dual, Form::Medial) => letter.initial + 1,
        (Joining::Right, _) => letter.isolated + 1,
    };
    char::from_u32(code).unwrap_or('\u{FFFD}')
}

fn lam_alef(alef: char) -> Option<u32> {
    LAM_ALEF.iter().find(|(a, _)| *a == alef).map(|&(_, lig)| lig)
}

/// Replace Arabic letters with their contextual presentation forms.
///
/// Characters outside the Arabic letter table pass through untouched.
pub fn reshape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    let prev_base = |i: usize| chars[..i].iter().rev().find(|c| !is_transparent(**c)).copied();
    let next_base = |i: usize| {
        chars[i + 1..]
            .iter()
            .enumerate()
            .find(|(_, c)| !is_transparent(**c))
            .map(|(offset, c)| (i + 1 + offset, *c))
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let Some(shape) = letter(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let joined_before =
            shape.joining != Joining::None && prev_base(i).is_some_and(joins_forward);

        if c == LAM {
            if let Some((alef_at, lig)) = next_base(i).and_then(|(j, n)| lam_alef(n).map(|l| (j, l))) {
                let form = if joined_before { 1 } else { 0 };
                out.push(char::from_u32(lig + form).unwrap_or(c));
                // Marks between lam and alef follow the ligature.
                out.extend(&chars[i + 1..alef_at]);
                i = alef_at + 1;
                continue;
            }
        }

        let joined_after =
            shape.joining == Joining::Dual && next_base(i).is_some_and(|(_, n)| joins_backward(n));

        let form = match (joined_before, joined_after) {
            (true, true) => Form::Medial,
            (true, false) => Form::Final,
            (false, true) => Form::Initial,
            (false, false) => Form::Isolated,
        };
        out.push(presentation(shape, form));
        i += 1;
    }

    out
}

/// Reorder logical text into left-to-right visual order.
///
/// Each line is reordered on its own and keeps its line break at the end.
/// Right-to-left runs are reversed cluster by cluster so that combining
/// marks stay after the letter they belong to, and mirrored characters
/// such as brackets are swapped for their counterparts.
pub fn visual_order(text: &str) -> String {
    let info = BidiInfo::new(text, None);
    let mut out = String::with_capacity(text.len());

    for para in &info.paragraphs {
        let line = &text[para.range.clone()];
        let content_len = line.trim_end_matches(is_paragraph_separator).len();
        let content = para.range.start..para.range.start + content_len;

        if !content.is_empty() {
            let (levels, runs) = info.visual_runs(para, content.clone());
            for run in runs {
                let slice = &text[run.clone()];
                if levels[run.start].is_rtl() {
                    for cluster in clusters(slice).into_iter().rev() {
                        out.extend(cluster.chars().map(mirrored));
                    }
                } else {
                    out.push_str(slice);
                }
            }
        }
        out.push_str(&text[content.end..para.range.end]);
    }

    out
}

fn is_paragraph_separator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{1C}'..='\u{1E}' | '\u{85}' | '\u{2029}')
}

/// The mirrored glyph shown for `c` inside a right-to-left run.
fn mirrored(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '\u{AB}' => '\u{BB}',
        '\u{BB}' => '\u{AB}',
        '\u{2039}' => '\u{203A}',
        '\u{203A}' => '\u{2039}',
        '\u{2264}' => '\u{2265}',
        '\u{2265}' => '\u{2264}',
        other => other,
    }
}

/// Split into base characters each followed by their combining marks.
fn clusters(text: &str) -> Vec<&str> {
    let mut clusters = Vec::new();
    let mut start = None;

    for (idx, c) in text.char_indices() {
        if is_transparent(c) && start.is_some() {
            continue;
        }
        if let Some(s) = start {
            clusters.push(&text[s..idx]);
        }
        start = Some(idx);
    }
    if let Some(s) = start {
        clusters.push(&text[s..]);
    }
    clusters
}

/// Contextual shaping followed by visual reordering.
pub fn shape_for_display(text: &str) -> String {
    visual_order(&reshape(text))
}
