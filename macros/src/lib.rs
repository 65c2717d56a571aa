use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Marks a test for the rxcore suites.
///
/// Sync tests become plain `#[test]` functions (or `wasm_bindgen_test` on
/// wasm32). Async tests are driven to completion on the calling thread with
/// `futures::executor::block_on`, so event-loop results can be awaited through
/// `futures::channel::oneshot` without pulling in a runtime.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(
        raw_args.span(),
        "rxcore_macro::test takes no arguments. Use #[rxcore_macro::test] on a sync or \
         async fn.",
      )
      .to_compile_error(),
    );
  }

  if input.sig.asyncness.is_none() {
    let expanded = quote! {
        #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
        #[cfg_attr(not(target_arch = "wasm32"), test)]
        #input
    };
    return TokenStream::from(expanded);
  }

  if !input.sig.inputs.is_empty() {
    return TokenStream::from(
      syn::Error::new(input.sig.inputs.span(), "async rxcore tests take no parameters")
        .to_compile_error(),
    );
  }

  let attrs = &input.attrs;
  let vis = &input.vis;
  let name = &input.sig.ident;
  let output = &input.sig.output;
  let body = &input.block;

  let expanded = quote! {
      #[test]
      #(#attrs)*
      #vis fn #name() #output {
        futures::executor::block_on(async move #body)
      }
  };

  TokenStream::from(expanded)
}
