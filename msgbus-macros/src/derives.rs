use quote::ToTokens;
use std::collections::HashSet;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Result, Token};

/// 消息类型必备的派生，按此顺序排在最前
fn message_derives() -> [Path; 5] {
    [
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ]
}

/// 去重后的派生列表：按末段名比较，`Serialize` 与 `serde::Serialize` 视为同一项
pub(crate) struct DeriveSet {
    paths: Vec<Path>,
    seen: HashSet<String>,
}

impl DeriveSet {
    /// 以消息必备派生为起点
    pub(crate) fn for_message() -> Self {
        let mut set = Self {
            paths: Vec::new(),
            seen: HashSet::new(),
        };
        for path in message_derives() {
            set.insert(path);
        }
        set
    }

    pub(crate) fn insert(&mut self, path: Path) -> bool {
        let added = self.seen.insert(key_of(&path));
        if added {
            self.paths.push(path);
        }
        added
    }

    fn to_attribute(&self) -> Attribute {
        let paths = &self.paths;
        syn::parse_quote!(#[derive(#(#paths),*)])
    }
}

fn key_of(path: &Path) -> String {
    path.segments
        .last()
        .map(|s| s.ident.to_string())
        .unwrap_or_else(|| path.to_token_stream().to_string())
}

/// 把用户写的 derive 并入消息必备派生，合并结果作为第一个属性
///
/// 其余属性（如 `#[serde(...)]`）保持原有顺序，排在 derive 之后才能被派生宏看到。
pub(crate) fn normalize_message_attrs(attrs: &mut Vec<Attribute>) -> Result<()> {
    let mut derives = DeriveSet::for_message();
    let mut rest = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if attr.path().is_ident("derive") {
            let list = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)?;
            for path in list {
                derives.insert(path);
            }
        } else {
            rest.push(attr);
        }
    }

    attrs.push(derives.to_attribute());
    attrs.extend(rest);
    Ok(())
}
