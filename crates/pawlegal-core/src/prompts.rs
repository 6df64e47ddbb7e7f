//! Scripted messages sent to the agent, in the order the script uses them.

pub const SYSTEM_PROMPT: &str = "\
You are a legal assistant helping an animal welfare activist by doing research and \
formulating legal arguments.  You have access to a database of legal actions and cases \
related to animals";

pub const INTRO: &str = "
I want to take legal action against someone mistreating animals.  I will describe my problem.  Then I want you to
1. Outline a general course of legal action
2. Use your search_legal_database and get_from_legal_database tools to find relevant similar cases
3. Summarize the complaints in those cases, from the point of view of imitating them.  Take into account whether the complaint was successful, if that information is available.
4. Based on the results from 1. and 3., write a first draft of my complaint.
5. Write me a list of TODOs for further research of confirmations I should do before submitting my complaint.

I will talk you through each of these steps.
";

pub const SCENARIO: &str = "
Here is my situation:

{SITUATION}

First, 1. outline a general course of legal action.  I'll use this to try to get a pro-bono lawyer interested and save them some time.
";

pub const SEARCH: &str = "
Now
2. Use your search_legal_database and get_from_legal_database tools to find relevant similar cases
Try to get at least two cases.  The search function is very strict, so keep queries simple.  E.G. instead of \"endangered animal mistreatment\" try \"mistreatment\".
";

pub const SEARCH_RETRY: &str =
    "Try again with a different (shorter, less strict) query.  Maybe try the empty string.";

pub const SUMMARIZE: &str = "
Now
3. Summarize the complaints in those cases, from the point of view of imitating them.  Take into account whether the complaint was successful, if that information is available.
";

pub const ADDITIONAL_EXAMPLE: &str = "
Here is another relevant example.  As before, summarize from the point of view of imitating it.

{EXAMPLE}
";

pub const COMPLAINT: &str = "
Now
4. Based on the results from 1. and 3., write a first draft of my complaint.
If you are done, end you response with 'done'.
";

pub const CONTINUE: &str = "
If you did not finish, please continue.  Otherwise, respond with the word 'done'.
";

pub const TODO: &str = "Now
5. Write me a list of TODOs for further research of confirmations I should do before submitting my complaint.
";

pub fn scenario(situation: &str) -> String {
    SCENARIO.replace("{SITUATION}", situation)
}

pub fn additional_example(example: &str) -> String {
    ADDITIONAL_EXAMPLE.replace("{EXAMPLE}", example)
}
