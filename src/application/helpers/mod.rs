pub mod callback_parsing;
