mod normalize_tests;
mod runner_tests;
mod serializer_tests;
mod session_tests;
