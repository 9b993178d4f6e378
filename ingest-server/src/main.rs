mod api;
mod background_service;
mod infrastructure;

fn main() {
    infrastructure::host::run()
}
