/*!
A minimal, textually-correct stand-in for the external XML-to-record
translator (spec §1 treats the translator as an out-of-scope collaborator).
[`RawXmlSource`] answers [`XmlSource`] path queries by scanning the raw
message bytes for the path's final tag name rather than building a real DOM
— sufficient for the tag shapes the path table in spec §4.2 actually reads,
and in the same "minimal amount of behavior needed to run standalone" spirit
as [`crate::upstream::TcpUpstreamClient`]'s frame reader.
*/
use crate::dispatch::MessageTranslator;
use crate::extract::XmlSource;

pub struct SimpleTranslator;

impl MessageTranslator for SimpleTranslator {
    fn translate(&self, xml: &[u8]) -> Box<dyn XmlSource> {
        Box::new(RawXmlSource {
            text: String::from_utf8_lossy(xml).into_owned(),
        })
    }
}

pub struct RawXmlSource {
    text: String,
}

impl RawXmlSource {
    pub fn new(text: impl Into<String>) -> Self {
        RawXmlSource { text: text.into() }
    }

    fn tag_name(path: &str) -> &str {
        path.rsplit('/').find(|seg| *seg != "*").unwrap_or(path)
    }
}

impl XmlSource for RawXmlSource {
    fn fields(&self, path: &str) -> Vec<String> {
        let tag = Self::tag_name(path);
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");

        let mut out = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find(&open) {
            let after_open = &rest[start + open.len()..];
            match after_open.find(&close) {
                Some(end) => {
                    out.push(after_open[..end].trim().to_string());
                    rest = &after_open[end + close.len()..];
                }
                None => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_repeated_tags() {
        let source = RawXmlSource::new(
            "<ADDRESS>10.0.0.0/8</ADDRESS><ADDRESS>192.168.0.0/16</ADDRESS>",
        );
        let values = source.fields("/BGP_MESSAGE/.../PREFIX/*/ADDRESS");
        assert_eq!(values, vec!["10.0.0.0/8", "192.168.0.0/16"]);
    }

    #[test]
    fn missing_tag_yields_empty() {
        let source = RawXmlSource::new("<OTHER>x</OTHER>");
        assert!(source.fields("/ADDRESS").is_empty());
    }
}
