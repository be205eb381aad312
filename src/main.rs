use std::{sync::Arc, time::Duration};

use dotenv::dotenv;
use make_ten_bot::quiz::{
    addition,
    session::{apply_answer, LoadTicket, SessionState, StoryLoads},
    story::{self, ChatGptBackend, StoryClient, StoryProblem},
    subtraction, AnswerState, Mode, Problem, Round,
};
use teloxide::{
    dispatching::dialogue::{ErasedStorage, InMemStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Stories = StoryClient<ChatGptBackend>;

/// Pause between a correct drill answer and the next drill.
const ADVANCE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Playing {
        session: Session,
    },
}

/// Everything one chat is playing with. Lives only in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub state: SessionState,
    pub round: Option<Round>,
    pub loads: StoryLoads,
}

type UserInfoStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting make-ten bot...");

    let api_key = std::env::var("CHATGPT_API_KEY").map_err(|_| "CHATGPT_API_KEY is not set")?;
    let stories: Arc<Stories> = Arc::new(StoryClient::new(ChatGptBackend::new(api_key)?));

    let bot = Bot::from_env();
    let storage: UserInfoStorage = InMemStorage::<State>::new().erase();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::Playing { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: Session, msg: Message| {
                    play(stories.clone(), bot, dialogue, session, msg)
                },
            )),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const GREETING_TEXT: &str = "你好！我是凑十法大师 🔟 一起来学凑十法吧！\n每天练习，成为数学大师！\n\n选一个练习开始：";

const ADDITION_BUTTON: &str = "加法";
const SUBTRACTION_BUTTON: &str = "减法";
const STORY_BUTTON: &str = "AI 故事";
const NEXT_STORY_BUTTON: &str = "下一个故事";
const RETRY_BUTTON: &str = "重试";

const LOADING_TEXT: &str = "正在生成新的挑战...";
const LOAD_FAILED_TEXT: &str = "无法加载故事。请检查网络或 API Key。";
const PICK_AN_OPTION_TEXT: &str = "请选择一个选项";

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    log::info!("New player in chat {}", msg.chat.id);
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(keyboard(&[], &[]))
        .await?;

    dialogue
        .update(State::Playing {
            session: Session::default(),
        })
        .await?;
    Ok(())
}

async fn play(
    stories: Arc<Stories>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: Session,
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, PICK_AN_OPTION_TEXT).await?;
        return Ok(());
    };

    if let Some(mode) = mode_from_button(text) {
        session.loads.cancel();
        session.state = session.state.with_mode(mode);
        return next_question(stories, bot, dialogue, session).await;
    }

    if session.state.active_mode == Mode::Story && (text == NEXT_STORY_BUTTON || text == RETRY_BUTTON)
    {
        return load_story(stories, bot, dialogue, session).await;
    }

    match text.trim().parse::<i32>() {
        Ok(selected) => answer(bot, dialogue, session, selected).await,
        Err(_) => {
            bot.send_message(msg.chat.id, PICK_AN_OPTION_TEXT).await?;
            Ok(())
        }
    }
}

async fn next_question(
    stories: Arc<Stories>,
    bot: Bot,
    dialogue: QuizDialogue,
    session: Session,
) -> HandlerResult {
    match session.state.active_mode {
        Mode::Addition => {
            let problem = Problem::Addition(addition::next_addition_problem());
            show_problem(&bot, &dialogue, session, problem).await
        }
        Mode::Subtraction => {
            let problem = Problem::Subtraction(subtraction::next_subtraction_problem());
            show_problem(&bot, &dialogue, session, problem).await
        }
        Mode::Story => load_story(stories, bot, dialogue, session).await,
    }
}

async fn show_problem(
    bot: &Bot,
    dialogue: &QuizDialogue,
    mut session: Session,
    problem: Problem,
) -> HandlerResult {
    let text = problem_text(&problem);
    let markup = keyboard(problem.options(), &[]);
    session.round = Some(Round::new(problem));

    bot.send_message(dialogue.chat_id(), text)
        .reply_markup(markup)
        .await?;
    dialogue.update(State::Playing { session }).await?;
    Ok(())
}

/// Fetches a story while the chat waits.
///
/// Runs inside the handler, so the dispatcher holds this chat's later updates
/// until the story has been shown or has failed.
async fn load_story(
    stories: Arc<Stories>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: Session,
) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    let ticket = session.loads.begin();

    bot.send_message(chat_id, format!("{}\n{}", story::TITLE, LOADING_TEXT))
        .reply_markup(keyboard(&[], &[]))
        .await?;
    if let Err(error) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        log::debug!("Typing indicator failed for chat {chat_id}: {error}");
    }

    let story = stories.fetch_story_problem().await;
    match settle_story(&mut session, ticket, story) {
        StoryDelivery::Stale => {
            log::debug!("Discarding stale story for chat {chat_id}");
            Ok(())
        }
        StoryDelivery::Show(problem) => show_problem(&bot, &dialogue, session, problem).await,
        StoryDelivery::Failed => {
            bot.send_message(chat_id, LOAD_FAILED_TEXT)
                .reply_markup(keyboard(&[], &[RETRY_BUTTON]))
                .await?;
            dialogue.update(State::Playing { session }).await?;
            Ok(())
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StoryDelivery {
    /// The chat stopped waiting for this request; nothing changes.
    Stale,
    Show(Problem),
    Failed,
}

/// Decides what a finished story request does to `session`.
fn settle_story(
    session: &mut Session,
    ticket: LoadTicket,
    story: Option<StoryProblem>,
) -> StoryDelivery {
    if !session.loads.finish(ticket) {
        return StoryDelivery::Stale;
    }
    session.round = None;
    match story {
        Some(story) => StoryDelivery::Show(Problem::Story(story)),
        None => StoryDelivery::Failed,
    }
}

async fn answer(bot: Bot, dialogue: QuizDialogue, mut session: Session, selected: i32) -> HandlerResult {
    let chat_id = dialogue.chat_id();
    // Nothing on screen yet (a story is still loading)
    let Some(round) = session.round.as_mut() else {
        return Ok(());
    };
    if round.state() != AnswerState::Unanswered {
        return Ok(());
    }
    if !round.problem().options().contains(&selected) {
        bot.send_message(chat_id, PICK_AN_OPTION_TEXT).await?;
        return Ok(());
    }
    let Some(verdict) = round.submit(selected) else {
        return Ok(());
    };
    let problem = round.problem().clone();
    session.state = apply_answer(session.state, verdict.score_delta);
    log::debug!(
        "Chat {chat_id} answered {selected} ({}), score {}",
        if verdict.is_correct { "correct" } else { "wrong" },
        session.state.score
    );

    let score = score_line(&session.state);
    let correct_answer = problem.correct_answer();
    match problem {
        Problem::Story(story) => {
            let text = if verdict.is_correct {
                format!("✨ 回答正确！\n{}\n\n{}", story.explanation, score)
            } else {
                format!(
                    "不太对哦。\n想想怎么能凑成 10。正确答案是 {}。\n\n{}",
                    correct_answer, score
                )
            };
            bot.send_message(chat_id, text)
                .reply_markup(keyboard(&[], &[NEXT_STORY_BUTTON]))
                .await?;
            dialogue.update(State::Playing { session }).await?;
            Ok(())
        }
        drill if verdict.is_correct => {
            bot.send_message(chat_id, format!("✅ 太棒了！答对了！\n{}", score))
                .await?;
            dialogue
                .update(State::Playing {
                    session: session.clone(),
                })
                .await?;
            tokio::time::sleep(ADVANCE_DELAY).await;

            let next = match drill.mode() {
                Mode::Subtraction => Problem::Subtraction(subtraction::next_subtraction_problem()),
                _ => Problem::Addition(addition::next_addition_problem()),
            };
            show_problem(&bot, &dialogue, session, next).await
        }
        drill => {
            bot.send_message(chat_id, format!("❌ 再试一次！加油！\n{}", score))
                .await?;
            // Same problem again, as a fresh round
            show_problem(&bot, &dialogue, session, drill).await
        }
    }
}

fn mode_from_button(text: &str) -> Option<Mode> {
    match text {
        ADDITION_BUTTON => Some(Mode::Addition),
        SUBTRACTION_BUTTON => Some(Mode::Subtraction),
        STORY_BUTTON => Some(Mode::Story),
        _ => None,
    }
}

fn problem_text(problem: &Problem) -> String {
    let body = match problem {
        Problem::Addition(problem) => {
            format!("{}\n\n{}", addition::INSTRUCTIONS, problem.formula())
        }
        Problem::Subtraction(problem) => {
            format!("{}\n\n{}", subtraction::INSTRUCTIONS, problem.formula())
        }
        Problem::Story(problem) => {
            format!("{}\n\n问：{}", problem.narrative_text, problem.question_text)
        }
    };
    format!("{}\n{}", problem.mode().title(), body)
}

fn score_line(state: &SessionState) -> String {
    let mut line = format!("⭐ 得分：{}", state.score);
    if state.shows_streak_badge() {
        line.push_str(&format!("  🏆 {} 连胜！", state.streak));
    }
    line
}

/// Answer options two per row, then any extra buttons, then the activity tabs.
fn keyboard(options: &[i32], extra: &[&str]) -> KeyboardMarkup {
    let mut rows = options
        .chunks(2)
        .map(|row| {
            row.iter()
                .map(|option| KeyboardButton::new(option.to_string()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    if !extra.is_empty() {
        rows.push(extra.iter().map(|text| KeyboardButton::new(*text)).collect());
    }
    rows.push(vec![
        KeyboardButton::new(ADDITION_BUTTON),
        KeyboardButton::new(SUBTRACTION_BUTTON),
        KeyboardButton::new(STORY_BUTTON),
    ]);
    KeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use make_ten_bot::quiz::{check_answer, subtraction::SubtractionProblem};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn story() -> StoryProblem {
        StoryProblem {
            narrative_text: "篮子里有7个橘子。".to_string(),
            question_text: "再放几个才有10个？".to_string(),
            correct_answer: 3,
            wrong_options: [2, 4, 5],
            explanation: "7 + 3 = 10".to_string(),
            options: [4, 3, 5, 2],
        }
    }

    #[test]
    fn story_arriving_after_a_mode_switch_is_dropped() {
        let mut session = Session::default();
        session.state = session.state.with_mode(Mode::Story);
        let ticket = session.loads.begin();

        // The child taps 加法 before the story comes back.
        session.loads.cancel();
        session.state = session.state.with_mode(Mode::Addition);
        session.round = Some(Round::new(Problem::Addition(
            addition::AdditionProblem::with_operand(4, &mut StdRng::seed_from_u64(3)),
        )));
        let before = session.clone();

        assert_eq!(settle_story(&mut session, ticket, Some(story())), StoryDelivery::Stale);
        assert_eq!(session, before);
        assert_eq!(settle_story(&mut session, ticket, None), StoryDelivery::Stale);
        assert_eq!(session, before);
    }

    #[test]
    fn superseded_story_request_is_dropped() {
        let mut session = Session::default();
        let old = session.loads.begin();
        let current = session.loads.begin();

        assert_eq!(settle_story(&mut session, old, Some(story())), StoryDelivery::Stale);
        assert!(session.loads.is_pending());
        assert_eq!(
            settle_story(&mut session, current, Some(story())),
            StoryDelivery::Show(Problem::Story(story()))
        );
        assert!(!session.loads.is_pending());
    }

    #[test]
    fn failed_story_clears_the_pending_request() {
        let mut session = Session::default();
        let ticket = session.loads.begin();
        assert_eq!(settle_story(&mut session, ticket, None), StoryDelivery::Failed);
        assert!(!session.loads.is_pending());
        assert_eq!(session.round, None);
    }

    #[test]
    fn tabs_map_to_modes() {
        assert_eq!(mode_from_button("加法"), Some(Mode::Addition));
        assert_eq!(mode_from_button("减法"), Some(Mode::Subtraction));
        assert_eq!(mode_from_button("AI 故事"), Some(Mode::Story));
        assert_eq!(mode_from_button("6"), None);
    }

    #[test]
    fn keyboard_puts_two_options_per_row_and_tabs_last() {
        let markup = keyboard(&[3, 5, 7, 9], &[RETRY_BUTTON]);
        let rows = markup
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                vec!["3", "5"],
                vec!["7", "9"],
                vec!["重试"],
                vec!["加法", "减法", "AI 故事"],
            ]
        );
    }

    #[test]
    fn score_line_shows_badge_after_three() {
        let mut state = SessionState::default();
        for _ in 0..3 {
            state = apply_answer(state, 10);
        }
        assert_eq!(score_line(&state), "⭐ 得分：30  🏆 3 连胜！");
        assert_eq!(score_line(&apply_answer(state, -5)), "⭐ 得分：25");
    }

    #[test]
    fn subtraction_text_has_title_and_formula() {
        let problem = Problem::Subtraction(SubtractionProblem::with_difference(
            7,
            &mut StdRng::seed_from_u64(1),
        ));
        let text = problem_text(&problem);
        assert!(text.starts_with("减法挑战 (减到10)"));
        assert!(text.ends_with("17 - ? = 10"));
        assert!(check_answer(&problem, 7).is_correct);
    }
}
