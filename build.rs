fn main() {
    println!("cargo:rerun-if-changed=src/bindings.h");

    // ESP-IDF link arguments are only needed for the device build; host
    // builds (tests, fuzzing) compile without the `espidf` feature.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
