//! Procedural macros supporting MapCache's error-context discipline.
//!
//! MapCache propagates errors as carried values (`anyhow::Result`) rather than
//! unwinding. The `#[context(...)]` attribute wraps a function body so that any
//! `Err` bubbling out of it is annotated with a formatted message describing
//! what the function was doing, without requiring a manual `.map_err` at every
//! call site.

mod args;

use args::Args;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::{ToTokens, quote};
use syn::parse_macro_input;

/// Wrap a function so any error returned from its body gains a contextual
/// message built from the given `format!` arguments.
///
/// ```ignore
/// #[context("loading tileset '{name}'")]
/// fn load_tileset(name: &str) -> anyhow::Result<Tileset> {
///     // ...
/// }
/// ```
///
/// Works for both sync and `async fn`. Pass `move,` as the first argument to
/// move captured variables into the wrapping closure/future.
#[proc_macro_attribute]
pub fn context(args: TokenStream, input: TokenStream) -> TokenStream {
	let Args(move_token, format_args) = parse_macro_input!(args);
	let mut input = parse_macro_input!(input as syn::ItemFn);

	let body = &input.block;
	let return_type = &input.sig.output;
	let err = Ident::new("err", Span::mixed_site());

	let new_body = if input.sig.asyncness.is_some() {
		let return_type = match return_type {
			syn::ReturnType::Default => {
				return syn::Error::new_spanned(input, "#[context] functions must return a Result")
					.to_compile_error()
					.into();
			}
			syn::ReturnType::Type(_, return_type) => return_type,
		};
		let result = Ident::new("result", Span::mixed_site());
		quote! {
			let #result: #return_type = async #move_token { #body }.await;
			#result.map_err(|#err| #err.context(format!(#format_args)).into())
		}
	} else {
		let force_fn_once = Ident::new("force_fn_once", Span::mixed_site());
		quote! {
			let #force_fn_once = ::core::iter::empty::<()>();
			(#move_token || #return_type {
				::core::mem::drop(#force_fn_once);
				#body
			})().map_err(|#err| #err.context(format!(#format_args)).into())
		}
	};
	input.block.stmts = vec![syn::Stmt::Expr(syn::Expr::Verbatim(new_body), None)];

	input.into_token_stream().into()
}
