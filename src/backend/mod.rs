pub mod cloud_provider;
