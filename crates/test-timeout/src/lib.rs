use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Block, ItemFn, LitInt};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runs an `async fn` test on a fresh current-thread runtime and fails it if it
/// does not finish within the deadline (seconds, default 30).
#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let secs = match parse_timeout(attr) {
        Ok(secs) => secs,
        Err(err) => return err.to_compile_error().into(),
    };
    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(&sig.ident, "tokio_timeout_test expects an async fn")
            .to_compile_error()
            .into();
    }
    sig.asyncness = None;

    let body = async_body(&block, secs);
    expand(strip(attrs, is_tokio_test), vis, sig, body, secs)
}

/// Bounds a synchronous test with a wall-clock deadline (seconds, default 30).
#[proc_macro_attribute]
pub fn timeout(attr: TokenStream, item: TokenStream) -> TokenStream {
    let secs = match parse_timeout(attr) {
        Ok(secs) => secs,
        Err(err) => return err.to_compile_error().into(),
    };
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_some() {
        return syn::Error::new_spanned(
            &sig.ident,
            "timeout expects a synchronous fn; use tokio_timeout_test for async tests",
        )
        .to_compile_error()
        .into();
    }

    let body = quote! { #block };
    expand(strip(attrs, is_plain_test), vis, sig, body, secs)
}

fn parse_timeout(attr: TokenStream) -> syn::Result<u64> {
    if attr.is_empty() {
        return Ok(DEFAULT_TIMEOUT_SECS);
    }
    let lit: LitInt = syn::parse(attr)?;
    let secs: u64 = lit.base10_parse()?;
    if secs == 0 {
        return Err(syn::Error::new_spanned(lit, "timeout must be greater than zero"));
    }
    Ok(secs)
}

fn async_body(block: &Block, secs: u64) -> TokenStream2 {
    quote! {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build Tokio runtime");
        runtime.block_on(async {
            tokio::time::timeout(std::time::Duration::from_secs(#secs), async move #block)
                .await
                .expect("test timed out");
        });
    }
}

/// Runs `body` on a watcher thread so a hung test is reported instead of
/// stalling the whole harness. Panics from the body are re-raised as-is.
fn expand(
    attrs: Vec<Attribute>,
    vis: syn::Visibility,
    sig: syn::Signature,
    body: TokenStream2,
    secs: u64,
) -> TokenStream {
    TokenStream::from(quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let deadline = std::time::Duration::from_secs(#secs);
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| { #body }));
                let _ = done_tx.send(outcome);
            });
            match done_rx.recv_timeout(deadline) {
                Ok(Ok(_)) => {}
                Ok(Err(payload)) => std::panic::resume_unwind(payload),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    panic!("test exceeded {}s deadline", #secs)
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("test thread exited without reporting")
                }
            }
        }
    })
}

fn strip(attrs: Vec<Attribute>, drop: fn(&Attribute) -> bool) -> Vec<Attribute> {
    attrs.into_iter().filter(|attr| !drop(attr)).collect()
}

fn is_tokio_test(attr: &Attribute) -> bool {
    let mut segments = attr.path().segments.iter();
    matches!(
        (segments.next(), segments.next(), segments.next()),
        (Some(first), Some(second), None)
            if first.ident == "tokio" && second.ident == "test"
    )
}

fn is_plain_test(attr: &Attribute) -> bool {
    let mut segments = attr.path().segments.iter();
    matches!((segments.next(), segments.next()), (Some(first), None) if first.ident == "test")
}
