use std::collections::HashMap;

use crate::Error;
use indoc::indoc;
use subst::substitute;

/// Longest page excerpt sent to the LLM, in characters.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 12_000;

const SUMMARIZE_PAGE: &str = indoc! { "
  You are summarizing one page of a website for an llms.txt index. The index lists every page with a link and a one-line description so that a language model can decide which pages to read.

  The page lives at: ${URL}

  This is the page's content as markdown:
  <page>
  ${CONTENT}
  </page>

  ${INSTRUCTIONS}

  Respond with a single JSON object and nothing else, using exactly these keys:
  {\"description\": \"<one sentence, at most 160 characters, describing what the page is for>\", \"summary\": \"<two to four sentences covering the page's key information>\"}
"};

/// Cuts `content` to at most `max_chars` characters.
fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

pub fn prompt_summarize_page(url: &str, content: &str, instructions: Option<&str>) -> Result<String, Error> {
    let res = substitute(SUMMARIZE_PAGE, &{
        let mut v = HashMap::new();
        v.insert("URL".to_string(), url.to_string());
        v.insert(
            "CONTENT".to_string(),
            excerpt(content, MAX_PROMPT_CONTENT_CHARS).to_string(),
        );
        v.insert(
            "INSTRUCTIONS".to_string(),
            instructions
                .map(|i| format!("Additional instructions from the site owner:\n<instructions>\n{}\n</instructions>", i))
                .unwrap_or_default(),
        );
        v
    })?;
    Ok(res)
}
