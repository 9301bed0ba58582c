fn main() {
    println!("cargo:rerun-if-changed=node_config.json");

    // Only the device build needs the ESP-IDF environment; host tests
    // compile without the `espidf` feature.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
