fn main() {
    livequeue::app::startup::startup();
}
