use crate::derives::normalize_message_attrs;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Ident, Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[message] 宏实现
/// - 仅支持非泛型的 struct / enum（类型名需在各节点间保持稳定且唯一）
/// - 合并默认派生：Debug, Clone, PartialEq, Serialize, Deserialize
/// - 生成 `::msgbus::message::Message` 实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as MessageAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let (attrs, ident, generics) = match &mut input {
        Item::Struct(s) => (&mut s.attrs, s.ident.clone(), s.generics.clone()),
        Item::Enum(e) => (&mut e.attrs, e.ident.clone(), e.generics.clone()),
        other => {
            return syn::Error::new(other.span(), "#[message] can only be used on struct or enum")
                .to_compile_error()
                .into();
        }
    };

    if !generics.params.is_empty() {
        return syn::Error::new(
            generics.span(),
            "#[message] does not support generic types; wrap the payload in a concrete type",
        )
        .to_compile_error()
        .into();
    }

    if let Err(err) = normalize_message_attrs(attrs) {
        return err.to_compile_error().into();
    }

    let type_name = match cfg.name {
        Some(lit) => {
            if lit.value().trim().is_empty() {
                return syn::Error::new(lit.span(), "message name must not be empty")
                    .to_compile_error()
                    .into();
            }
            quote! { #lit }
        }
        None => {
            let ident_str = LitStr::new(&ident.to_string(), ident.span());
            quote! { ::core::concat!(::core::module_path!(), "::", #ident_str) }
        }
    };

    let expanded = quote! {
        #input

        impl ::msgbus::message::Message for #ident {
            const TYPE_NAME: &'static str = #type_name;
        }
    };

    TokenStream::from(expanded)
}

// 解析宏参数：#[message] 或 #[message(name = "...")]
struct MessageAttrConfig {
    name: Option<LitStr>,
}

impl Parse for MessageAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut name = None;

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            if key == "name" {
                if name.is_some() {
                    return Err(syn::Error::new(key.span(), "duplicate 'name' specified"));
                }
                name = Some(input.parse::<LitStr>()?);
            } else {
                return Err(syn::Error::new(
                    key.span(),
                    "unknown key for #[message]; expected `name`",
                ));
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(Self { name })
    }
}
