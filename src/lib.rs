//! Make-ten practice for young children: the addition and subtraction drills,
//! AI story problems and the score/streak bookkeeping behind the chat bot.

pub mod quiz;
