fn main() {
	prism_scan::build();
}
