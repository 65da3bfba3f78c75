#![no_main]

use libfuzzer_sys::fuzz_target;
use vdom::{ComponentRef, NormalizeConfig, PropBag, Template, Value, normalize};

const MAX_DEPTH: usize = 8;

/// Decodes a byte stream into an arbitrary (often malformed) template.
struct Decoder<'a> {
    bytes: &'a [u8],
}

impl Decoder<'_> {
    fn next(&mut self) -> Option<u8> {
        let (&b, rest) = self.bytes.split_first()?;
        self.bytes = rest;
        Some(b)
    }

    fn items(&mut self, depth: usize) -> Vec<Template> {
        let len = self.next().map_or(0, |b| usize::from(b % 5));
        (0..len).map(|_| self.template(depth + 1)).collect()
    }

    fn template(&mut self, depth: usize) -> Template {
        let Some(op) = self.next() else {
            return Template::Empty;
        };
        if depth >= MAX_DEPTH {
            return Template::text(format!("t{op}"));
        }
        match op % 9 {
            0 => Template::Empty,
            1 => Template::text(format!("t{}", op / 9)),
            2 => Template::Scalar(Value::Int(i64::from(op))),
            3 => Template::List(self.items(depth)),
            4 => Template::Fragment(self.items(depth)),
            5 => {
                let key = self.next().unwrap_or(0) % 4;
                let props = PropBag::new().with("key", i64::from(key));
                Template::element("li", props, self.items(depth))
            }
            6 => Template::element("div", PropBag::new().with("class", "c"), self.items(depth)),
            7 => Template::component(&ComponentRef::new("C"), PropBag::new(), self.items(depth)),
            _ => Template::Props(PropBag::new().with("title", Value::Bool(op % 2 == 0))),
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let template = Decoder { bytes: data }.template(0);
    let config = NormalizeConfig {
        check_duplicate_keys: true,
    };
    // Malformed input must surface as an error, never a panic.
    let _ = normalize(&template, &config);
});
