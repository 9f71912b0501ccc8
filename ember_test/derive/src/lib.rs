use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemFn};

/// Register a `fn(&BootInfo) -> bool` as a kernel test.
#[proc_macro_attribute]
pub fn kernel_test(_attribute: TokenStream, item: TokenStream) -> TokenStream {
    let test_fn: ItemFn = parse_macro_input!(item);

    let fn_name_ident = &test_fn.sig.ident;
    let name = fn_name_ident.to_string();
    let description_name = format_ident!("__KERNEL_TEST_{}", name);

    TokenStream::from(quote! {
        #test_fn

        #[allow(non_upper_case_globals)]
        #[linkme::distributed_slice(ember_test::KERNEL_TESTS)]
        static #description_name: ember_test::TestDescription = ember_test::TestDescription {
            name: #name,
            test_fn: #fn_name_ident,
            location: ember_test::Location {
                module: module_path!(),
                file: file!(),
                line: line!(),
                column: column!(),
            },
        };
    })
}
