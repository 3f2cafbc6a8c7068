pub mod margin_provider;
